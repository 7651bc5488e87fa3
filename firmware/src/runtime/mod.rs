use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use radio_core::config::RadioConfig;
use radio_core::control::{ControlLoop, NoRemoteConfig};
use radio_core::indicator::{IndicatorOutput, IndicatorState, LedChannel};
use static_cell::StaticCell;

use crate::clock::FirmwareInstant;
use crate::hw::board::{BoardAudio, LedBank, Potentiometers, UnmanagedLink};

mod blink_task;
mod control_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type Radio =
    ControlLoop<FirmwareInstant, BoardAudio<'static>, UnmanagedLink, NoRemoteConfig>;

type SharedLeds = Mutex<CriticalSectionRawMutex, RefCell<LedBank<'static>>>;

/// Blink flags shared by the control and blink tasks.
pub(super) static INDICATOR: IndicatorState = IndicatorState::new();
static LEDS: StaticCell<SharedLeds> = StaticCell::new();

/// LED bank handle that both tasks write through.
#[derive(Copy, Clone)]
pub(super) struct SharedOutput(&'static SharedLeds);

impl IndicatorOutput for SharedOutput {
    fn write(&mut self, channel: LedChannel, lit: bool) {
        self.0.lock(|bank| bank.borrow_mut().write(channel, lit));
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        ADC1,
        ..
    } = hal::init(hal::Config::default());

    let bank = LedBank::new(
        Output::new(PA4, Level::High, Speed::Low),
        Output::new(PA5, Level::High, Speed::Low),
        Output::new(PA6, Level::High, Speed::Low),
    );
    let output = SharedOutput(LEDS.init(Mutex::new(RefCell::new(bank))));
    let pots = Potentiometers::new(Adc::new(ADC1), PA0, PA1);
    let audio = BoardAudio::new(Output::new(PA7, Level::Low, Speed::Low));

    let config = RadioConfig::default();
    let blink_period = config.timing.blink_period;
    let radio: Radio = ControlLoop::new(
        config,
        audio,
        UnmanagedLink,
        NoRemoteConfig,
        FirmwareInstant::now(),
    );

    spawner
        .spawn(blink_task::run(output, blink_period))
        .expect("failed to spawn blink task");

    spawner
        .spawn(control_task::run(radio, pots, output))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
