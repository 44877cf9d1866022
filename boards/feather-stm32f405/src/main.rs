#![deny(unsafe_code)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod device_id;
mod display;
mod eth;
mod network;
mod time;
mod tls_buffers;
mod transport;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// The one channel between the clock task and the MQTT task
static MQTT_BRIDGE: transport::MqttBridge = transport::MqttBridge::new();

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use clock_core::{ClockApp, ClockConfig, Duration as ClockDuration};
    use defmt::{info, warn};
    use embassy_futures::join::{join, join3};
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::rng::Rng;
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use hal_abstractions::PersistentClock;
    use rand_core::RngCore;
    use rtic::Mutex;

    use display::Max7219;
    use network::{manager, MqttConfig, MqttSession, NetworkClient, NetworkConfig, SntpClient, SntpConfig};
    use time::RtcClock;
    use transport::ChannelTransport;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    type ClockDisplay = Max7219<Spi<'static, Blocking>, Output<'static>>;
    type HardwareRng = Rng<'static, peripherals::RNG>;

    /// How often the clock task wakes
    const CLOCK_TICK_MS: u64 = 50;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    #[shared]
    struct Shared {
        clock: ClockApp<RtcClock>,
    }

    #[local]
    struct Local {
        display: ClockDisplay,
        transport: ChannelTransport,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("NTP clock starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // 12 MHz / 6 * 168 = 336 MHz VCO; /4 = 84 MHz SYSCLK, /7 = 48 MHz RNG
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);

        let mut rtc_clock = RtcClock::new(Rtc::new(p.RTC, RtcConfig::default()));
        let boot_unix = match rtc_clock.read_unix() {
            Ok(secs) => secs,
            Err(e) => {
                warn!("RTC unreadable at boot: {}", e);
                0
            }
        };
        info!("Device UID {}, RTC at {}", device_id::uid_hex(), boot_unix);

        // MAX7219 on SPI1: SCK A1 (PA5), DIN A3 (PA7), LOAD A0 (PA4)
        let mut display_spi_config = spi::Config::default();
        display_spi_config.frequency = Hertz(1_000_000);
        let display_spi = Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PA7, display_spi_config);
        let display_cs = Output::new(p.PA4, Level::High, Speed::VeryHigh);
        let display = Max7219::new(display_spi, display_cs);

        // Also serves the TLS handshakes once the network task owns it
        let mut rng = Rng::new(p.RNG, RngIrqs);
        let seed = device_id::client_id_seed(boot_unix, rng.next_u32());

        let clock_config = ClockConfig::default();
        let clock = match ClockApp::new(&clock_config, rtc_clock, seed) {
            Ok(clock) => clock,
            Err(e) => defmt::panic!("Invalid clock configuration: {}", e),
        };

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        clock_task::spawn().ok();
        network_task::spawn(net_periph, rng, clock_config.sync_interval).ok();

        (
            Shared { clock },
            Local {
                display,
                transport: ChannelTransport::new(&MQTT_BRIDGE),
            },
        )
    }

    /// Clock task - redraws the display and drives the MQTT session
    ///
    /// Never waits on the network: the transport only queues work for
    /// `network_task`, so a dead broker cannot freeze the display.
    #[task(priority = 1, shared = [clock], local = [display, transport])]
    async fn clock_task(mut cx: clock_task::Context) {
        let display = cx.local.display;
        let transport = cx.local.transport;

        let sample = cx.shared.clock.lock(|clock| clock.start(time::now(), &mut *display));
        info!("Showing {}:{} ({})", sample.hour(), sample.minute(), sample.source());

        loop {
            cx.shared.clock.lock(|clock| {
                let now = time::now();
                clock.poll_messaging(now, &mut *transport, &mut *display);
                clock.refresh_display(now, &mut *display);
            });
            Mono::delay(CLOCK_TICK_MS.millis()).await;
        }
    }

    /// Network task - Ethernet, DHCP, SNTP and the MQTT connection
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1, shared = [clock])]
    async fn network_task(
        cx: network_task::Context,
        periph: NetworkPeripherals,
        mut rng: HardwareRng,
        sync_interval: ClockDuration,
    ) -> ! {
        use embassy_net::{Config, StackResources};
        use static_cell::StaticCell;

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let eth_periph = eth::EthPeripherals {
            spi,
            cs: Output::new(periph.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(periph.reset, Level::High, Speed::Low),
            int: ExtiInput::new(periph.int, periph.exti, Pull::Up),
        };

        let net_config = NetworkConfig::default();
        let (device, w5500_runner) = match eth::init_w5500(eth_periph, net_config.mac_addr).await {
            Ok(parts) => parts,
            Err(e) => {
                // The clock keeps running from the RTC; the session manager
                // will see the link stay down.
                warn!("Network unavailable: {}", e);
                loop {
                    Mono::delay(60.secs()).await;
                }
            }
        };

        static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            net_config.seed,
        );
        info!("Network stack initialized with DHCP");

        let mut mqtt = MqttSession::new(MqttConfig::default());

        let app_logic = async {
            manager::wait_for_config(&stack).await;
            join(
                time_sync_loop(&stack, cx.shared.clock, sync_interval),
                mqtt.run(&stack, &mut rng, &MQTT_BRIDGE),
            )
            .await;
        };

        join3(w5500_runner.run(), net_runner.run(), app_logic).await;
        // Runners and the app logic never finish
        loop {
            Mono::delay(60.secs()).await;
        }
    }

    /// Ask SNTP for the time every `interval` and offer it to the clock
    async fn time_sync_loop(
        stack: &embassy_net::Stack<'static>,
        mut clock: impl Mutex<T = ClockApp<RtcClock>>,
        interval: ClockDuration,
    ) -> ! {
        let mut sntp = SntpClient::new(SntpConfig::default());
        loop {
            match sntp.run(stack).await {
                Ok(sample) => match clock.lock(|clock| clock.accept_network_sync(sample)) {
                    Ok(record) => info!(
                        "Clock synced to {} UTC (RTC updated: {})",
                        record.utc_secs, record.rtc_updated
                    ),
                    Err(rejection) => warn!("Network time rejected: {}", rejection),
                },
                Err(e) => warn!("SNTP sync failed: {}", e),
            }
            Mono::delay(interval.to_millis().millis()).await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
