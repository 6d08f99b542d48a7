//! Firmware entry point: wires the capture pipeline to the ESP32 VHCI
//! controller, UART0 and FreeRTOS, then runs the bring-up sequencer.
//!
//! Everything hardware-free lives in the library; this binary is the only
//! place that talks to ESP-IDF.

#[cfg(target_os = "espidf")]
mod firmware {
    use core::ffi::c_void;
    use core::ptr;

    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::sys;

    use ble_adv_probe::init::{
        BringUpError, Controller, ControllerError, ScanConfig, Sequencer, SpawnError, TaskSpawner,
    };
    use ble_adv_probe::packet::{MAX_EVENT_SIZE, QUEUE_CAPACITY, RING_SLOTS};
    use ble_adv_probe::{Forwarder, ProbeContext, SerialLink};

    extern "C" {
        // Espressif hook for pinning BLE scanning to one channel.
        // Lives in the vendor blob libbtdm_app.a; ESP32 only.
        fn btdm_scan_channel_setting(channel: u8);
    }

    const UART_PORT: sys::uart_port_t = sys::uart_port_t_UART_NUM_0;
    const UART_BAUD: i32 = 115_200;

    /// Task parameters the original ESP HCI example established: 2 KiB stack,
    /// priority 6, pinned to core 0.
    const FORWARD_TASK_STACK: u32 = 2048;
    const FORWARD_TASK_PRIO: u32 = 6;
    const FORWARD_TASK_CORE: i32 = 0;

    /// Process-lifetime capture context, shared between the VHCI interrupt
    /// callback and the forwarding task. Never torn down.
    static PROBE: ProbeContext = ProbeContext::new();

    // ── VHCI interrupt side ──────────────────────────────────────────────

    unsafe extern "C" fn notify_host_send_available() {}

    /// Controller-to-host callback: runs at interrupt priority, must not
    /// block or allocate. Timestamp, store, queue; drops are counted, never
    /// escalated.
    unsafe extern "C" fn notify_host_recv(data: *mut u8, len: u16) -> i32 {
        let timestamp_us = sys::esp_timer_get_time();
        let bytes = core::slice::from_raw_parts(data, len as usize);
        match PROBE.on_event(timestamp_us, bytes) {
            Ok(()) => sys::ESP_OK,
            Err(_) => sys::ESP_FAIL,
        }
    }

    static VHCI_CALLBACKS: sys::esp_vhci_host_callback_t = sys::esp_vhci_host_callback_t {
        notify_host_send_available: Some(notify_host_send_available),
        notify_host_recv: Some(notify_host_recv),
    };

    // ── Collaborator implementations ─────────────────────────────────────

    /// The VHCI command surface as the sequencer's radio collaborator.
    struct VhciController;

    impl Controller for VhciController {
        fn is_send_ready(&mut self) -> bool {
            unsafe { sys::esp_vhci_host_check_send_available() }
        }

        fn send_command(&mut self, packet: &[u8]) -> Result<(), ControllerError> {
            unsafe {
                sys::esp_vhci_host_send_packet(packet.as_ptr() as *mut u8, packet.len() as u16);
            }
            Ok(())
        }

        fn restrict_to_channel(&mut self, channel: u8) -> Result<(), ControllerError> {
            unsafe { btdm_scan_channel_setting(channel) };
            // The collector keys on this line to learn the channel.
            println!("Locked to channel: {}", channel);
            Ok(())
        }
    }

    /// UART0, write + wait-for-wire. The wait is the pipeline's only flow
    /// control.
    struct Uart0;

    impl SerialLink for Uart0 {
        type Error = sys::EspError;

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            let written = unsafe {
                sys::uart_write_bytes(UART_PORT, bytes.as_ptr() as *const c_void, bytes.len())
            };
            if written < 0 || written as usize != bytes.len() {
                return Err(sys::EspError::from_infallible::<{ sys::ESP_FAIL }>());
            }
            Ok(())
        }

        fn wait_tx_done(&mut self) -> Result<(), Self::Error> {
            sys::esp!(unsafe { sys::uart_wait_tx_done(UART_PORT, sys::TickType_t::MAX) })
        }
    }

    extern "C" fn forwarding_task(_arg: *mut c_void) {
        let mut forwarder = Forwarder::new(&PROBE, Uart0);
        forwarder.run(|| FreeRtos::delay_ms(1));
    }

    struct PinnedSpawner;

    impl TaskSpawner for PinnedSpawner {
        fn start_forwarding(&mut self) -> Result<(), SpawnError> {
            let created = unsafe {
                sys::xTaskCreatePinnedToCore(
                    Some(forwarding_task),
                    b"adv_forward\0".as_ptr().cast(),
                    FORWARD_TASK_STACK,
                    ptr::null_mut(),
                    FORWARD_TASK_PRIO,
                    ptr::null_mut(),
                    FORWARD_TASK_CORE,
                )
            };
            // pdPASS
            if created == 1 {
                Ok(())
            } else {
                Err(SpawnError)
            }
        }
    }

    // ── Bring-up ─────────────────────────────────────────────────────────

    fn init_nvs() -> Result<(), sys::EspError> {
        // PHY calibration data lives in NVS; erase and retry on layout or
        // version mismatch, as the IDF examples do.
        let mut err = unsafe { sys::nvs_flash_init() };
        if err == sys::ESP_ERR_NVS_NO_FREE_PAGES as i32
            || err == sys::ESP_ERR_NVS_NEW_VERSION_FOUND as i32
        {
            sys::esp!(unsafe { sys::nvs_flash_erase() })?;
            err = unsafe { sys::nvs_flash_init() };
        }
        sys::esp!(err)
    }

    fn init_uart() -> Result<(), sys::EspError> {
        let config = sys::uart_config_t {
            baud_rate: UART_BAUD,
            data_bits: sys::uart_word_length_t_UART_DATA_8_BITS,
            parity: sys::uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: sys::uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: sys::uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        sys::esp!(unsafe { sys::uart_param_config(UART_PORT, &config) })?;
        sys::esp!(unsafe {
            sys::uart_driver_install(
                UART_PORT,
                (RING_SLOTS * MAX_EVENT_SIZE) as i32,
                (RING_SLOTS * MAX_EVENT_SIZE) as i32,
                QUEUE_CAPACITY as i32,
                ptr::null_mut(),
                0,
            )
        })
    }

    /// `BT_CONTROLLER_INIT_CONFIG_DEFAULT` is a C macro the bindings cannot
    /// expand; fill the fields the controller's sanity check requires and
    /// keep sdkconfig defaults for the rest.
    fn bt_controller_config() -> sys::esp_bt_controller_config_t {
        let mut config = sys::esp_bt_controller_config_t::default();
        config.controller_task_stack_size = sys::ESP_TASK_BT_CONTROLLER_STACK as u16;
        config.controller_task_prio = sys::ESP_TASK_BT_CONTROLLER_PRIO as u8;
        config.mode = sys::esp_bt_mode_t_ESP_BT_MODE_BLE as u8;
        config.magic = sys::ESP_BT_CONTROLLER_CONFIG_MAGIC_VAL;
        config
    }

    fn init_controller() -> Result<(), sys::EspError> {
        // Classic BT is never used; hand its heap back first.
        sys::esp!(unsafe {
            sys::esp_bt_controller_mem_release(sys::esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT)
        })?;

        let mut config = bt_controller_config();
        sys::esp!(unsafe { sys::esp_bt_controller_init(&mut config) })?;
        sys::esp!(unsafe {
            sys::esp_bt_controller_enable(sys::esp_bt_mode_t_ESP_BT_MODE_BLE)
        })
    }

    fn bring_up() -> Result<(), BringUpError> {
        // Must precede any controller traffic.
        unsafe { sys::esp_vhci_host_register_callback(&VHCI_CALLBACKS) };

        let mut sequencer =
            Sequencer::new(VhciController, PinnedSpawner, ScanConfig::default());
        sequencer.run_to_completion(|| FreeRtos::delay_ms(100))
    }

    pub fn run() {
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        // One human-readable line outside the framed data channel; the
        // collector uses it to align device time with wall-clock time.
        let start_us = unsafe { sys::esp_timer_get_time() };
        println!("Capture started at: {}", start_us / 1000);

        if let Err(err) = init_nvs() {
            log::error!("NVS bring-up failed: {}", err);
            return;
        }
        if let Err(err) = init_uart() {
            log::error!("UART bring-up failed: {}", err);
            return;
        }
        if let Err(err) = init_controller() {
            log::error!("Bluetooth controller bring-up failed: {}", err);
            return;
        }
        if let Err(err) = bring_up() {
            // Fatal: no retry, no fallback. Inert until physical reset.
            log::error!("scan bring-up failed: {}", err);
            return;
        }

        log::info!("capture pipeline running");
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    firmware::run();
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    // The probe only does useful work on the ESP32 target; the library and
    // its tests are the host-side surface.
    eprintln!("ble-adv-probe firmware must be built for the espidf target");
}
