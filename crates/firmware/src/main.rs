//! OPL Jukebox is [Embassy](https://embassy.dev)-based firmware which plays music on a Yamaha
//! [YM3812 (OPL2)](https://en.wikipedia.org/wiki/Yamaha_OPL#OPL2) FM synthesis chip, or an FPGA clone of it. The firmware
//! runs on the [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is
//! powered by an F7-series STM32 microcontroller.
//!
//! The nine voices of the chip are fed either from a serial [MIDI](https://midi.org/midi-1-0) input or from a song stored
//! in flash; the user button switches between the two. In MIDI input mode, an external controller may also send events
//! ready-made over a second serial link. Whatever the source, events pass through a single queue to the
//! synthesis engine, which runs on its own high-priority executor so that musical timing does not depend on the rest of
//! the firmware.

#![no_std]
#![no_main]

mod midi_input;
mod mode;
mod opl2_bus;
mod song_player;
mod wire_input;

use crate::{
    mode::{MODE_SYNC, select_mode},
    opl2_bus::GpioBus,
};
use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::select::{Either, select};
use embassy_stm32::{
    Config, bind_interrupts,
    exti::ExtiInput,
    gpio::{Level, Output, Pull, Speed},
    interrupt::{self, InterruptExt, Priority},
    peripherals,
    time::Hertz,
    usart::{self, UartRx},
};
use embassy_time::{Delay, Duration, Timer};
use opl_jukebox_lib::{
    event::EventQueue,
    song::{DEMO_BANK, PlaybackState, PlaybackStateReceiver, PlaybackStateSync},
    synth::{
        EngineStatusReceiver, EngineStatusSender, EngineStatusSync, MasterClock, Opl2,
        SynthesisEngine, TableBank,
    },
};

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        USART2 => usart::InterruptHandler<peripherals::USART2>;
        USART3 => usart::InterruptHandler<peripherals::USART3>;
    }
);

/// Half the period of the playback LED's blinking.
const BLINK_INTERVAL: Duration = Duration::from_millis(250);

/// The clock of the chip on the attached OPL2 board.
const MASTER_CLOCK: MasterClock = MasterClock::Native;

/// Carries events from the song player and the MIDI input to the synthesis engine.
static EVENT_QUEUE: EventQueue = EventQueue::new();

/// Publishes voice activity and program assignments.
static STATUS_SYNC: EngineStatusSync = EngineStatusSync::new();

/// Publishes what the song player is doing.
static PLAYBACK_SYNC: PlaybackStateSync = PlaybackStateSync::new();

type Synthesizer = SynthesisEngine<Opl2<GpioBus<'static>>, TableBank<'static>>;

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[embassy_stm32::interrupt]
unsafe fn UART4() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing OPL Jukebox");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            divq: None,
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
    }
    let p = embassy_stm32::init(config);

    // the OPL2 data bus sits on the lower half of port E, its control lines on port G
    let data = [
        Output::new(p.PE0, Level::Low, Speed::VeryHigh),
        Output::new(p.PE1, Level::Low, Speed::VeryHigh),
        Output::new(p.PE2, Level::Low, Speed::VeryHigh),
        Output::new(p.PE3, Level::Low, Speed::VeryHigh),
        Output::new(p.PE4, Level::Low, Speed::VeryHigh),
        Output::new(p.PE5, Level::Low, Speed::VeryHigh),
        Output::new(p.PE6, Level::Low, Speed::VeryHigh),
        Output::new(p.PE7, Level::Low, Speed::VeryHigh),
    ];
    let bus = GpioBus::new(
        data,
        Output::new(p.PG0, Level::Low, Speed::VeryHigh),
        Output::new(p.PG1, Level::High, Speed::VeryHigh),
        Output::new(p.PG2, Level::High, Speed::VeryHigh),
        Output::new(p.PG3, Level::High, Speed::VeryHigh),
    );
    let engine = SynthesisEngine::new(Opl2::new(bus, MASTER_CLOCK), DEMO_BANK);

    // the synthesis engine gets an executor of its own which preempts everything spawned on the thread executor
    interrupt::UART4.set_priority(Priority::P6);
    let spawner_high = EXECUTOR_HIGH.start(interrupt::UART4);
    unwrap!(spawner_high.spawn(synthesis(engine, STATUS_SYNC.sender())));

    let green_led = Output::new(p.PB0, Level::Low, Speed::Low);
    let status = STATUS_SYNC
        .receiver()
        .expect("Engine status synchronizer should have a receiver available");
    unwrap!(spawner.spawn(voice_activity(green_led, status)));

    let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    let blue_led = Output::new(p.PB7, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(select_mode(button, blue_led, MODE_SYNC.sender())));

    // MIDI runs at 31,250 baud, 8N1; per the board's alternate function table, USART2 receives on port D, pin 6
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = 31_250;
    let rx = unwrap!(UartRx::new(
        p.USART2,
        Irqs,
        p.PD6,
        p.DMA1_CH5,
        uart_config
    ));
    let mode = MODE_SYNC
        .receiver()
        .expect("Mode synchronizer should have a receiver available");
    unwrap!(spawner.spawn(midi_input::midi_input(rx, mode)));

    let play_pause = ExtiInput::new(p.PD1, p.EXTI1, Pull::Up);
    let skip = ExtiInput::new(p.PD0, p.EXTI0, Pull::Up);
    let mode = MODE_SYNC
        .receiver()
        .expect("Mode synchronizer should have a receiver available");
    unwrap!(spawner.spawn(song_player::song_player(
        mode,
        play_pause,
        skip,
        PLAYBACK_SYNC.sender()
    )));

    let red_led = Output::new(p.PB14, Level::Low, Speed::Low);
    let playback = PLAYBACK_SYNC
        .receiver()
        .expect("Playback synchronizer should have a receiver available");
    unwrap!(spawner.spawn(playback_indicator(red_led, playback)));

    // external controllers share the ST-LINK's virtual COM port, which is wired to USART3 on port D, pin 9
    let mut link_config = usart::Config::default();
    link_config.baudrate = 115_200;
    let link = unwrap!(UartRx::new(
        p.USART3,
        Irqs,
        p.PD9,
        p.DMA1_CH1,
        link_config
    ));
    let mode = MODE_SYNC
        .receiver()
        .expect("Mode synchronizer should have a receiver available");
    unwrap!(spawner.spawn(wire_input::wire_input(link, mode)));
}

/// Task responsible for the OPL2: primes it, then voices queued events forever.
#[embassy_executor::task]
async fn synthesis(mut engine: Synthesizer, status: EngineStatusSender<'static>) -> ! {
    engine.start();
    engine.run(&EVENT_QUEUE, &mut Delay, status).await
}

/// Lights the LED while any voice is sounding.
#[embassy_executor::task]
async fn voice_activity(
    mut led: Output<'static>,
    mut status: EngineStatusReceiver<'static>,
) -> ! {
    loop {
        let snapshot = status.changed().await;
        led.set_level(Level::from(snapshot.any_voice_active()));
    }
}

/// Lights the LED while the song is playing and blinks it while the song waits to start over.
#[embassy_executor::task]
async fn playback_indicator(
    mut led: Output<'static>,
    mut playback: PlaybackStateReceiver<'static>,
) -> ! {
    let mut state = playback.get().await;
    loop {
        match state {
            PlaybackState::Playing => led.set_high(),
            PlaybackState::Paused => led.set_low(),
            PlaybackState::AwaitingRestart => led.toggle(),
        }
        state = match state {
            PlaybackState::AwaitingRestart => {
                match select(playback.changed(), Timer::after(BLINK_INTERVAL)).await {
                    Either::First(new_state) => new_state,
                    Either::Second(()) => state,
                }
            }
            _ => playback.changed().await,
        };
    }
}
