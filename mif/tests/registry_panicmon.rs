//! Client plumbing: the registry connecting transports to client drivers, and
//! the panic monitor a subsystem manager hangs off a transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use linkme::distributed_slice;
use scsc_mif::irq::MockIrqController;
use scsc_mif::memory::HeapMemory;
use scsc_mif::panicmon::{PANIC_CODE_FW, PanicMonitor, SubsystemManager};
use scsc_mif::pcie::{PcieConfig, PcieMif, RESET_REQUEST_SOURCE};
use scsc_mif::platform::{
    HostServices, PlatformConfig, PlatformMif, PlatformRegmaps, exynos9610,
};
use scsc_mif::registry::{self, MIF_CLIENT_DRIVERS, MIF_REGISTRY, MifClientDriver, MifRegistry};
use scsc_mif::{BackendKind, MifError, MifTransport};
use scsc_regmap::mock::MockRegmap;
use scsc_sync::FakeClock;

static STATIC_PROBES: AtomicUsize = AtomicUsize::new(0);

#[distributed_slice(MIF_CLIENT_DRIVERS)]
static STATIC_CLIENT: MifClientDriver = MifClientDriver {
    name: "static_client",
    probe: |_, _| {
        STATIC_PROBES.fetch_add(1, Ordering::SeqCst);
    },
    remove: |_, _| {},
};

fn pcie() -> Arc<PcieMif> {
    PcieMif::new(
        PcieConfig {
            prealloc_len: 0x4000,
            alloc_len: 0x2000,
            enable_arm_reset: true,
        },
        Arc::new(MockRegmap::new("bar0")),
        Arc::new(HeapMemory::default()),
        Arc::new(MockIrqController::new()),
    )
}

fn platform() -> Arc<PlatformMif> {
    let regs = PlatformRegmaps {
        pmu: Arc::new(MockRegmap::new("pmu")),
        pmic_apm: None,
        mailbox: Arc::new(MockRegmap::new("mailbox")),
        dbus_baaw: Arc::new(MockRegmap::new("dbus_baaw")),
        pbus_baaw: Arc::new(MockRegmap::new("pbus_baaw")),
        remap: Arc::new(MockRegmap::new("remap")),
        boot_cfg: Arc::new(MockRegmap::new("boot_cfg")),
    };
    let host = HostServices {
        irq: Arc::new(MockIrqController::new()),
        memory: Arc::new(HeapMemory::default()),
        clock: Arc::new(FakeClock::new()),
    };
    PlatformMif::new(
        exynos9610::config(),
        PlatformConfig::new(0x8000_0000, 0x10000),
        regs,
        host,
    )
    .unwrap()
}

#[derive(Default)]
struct RecordingManager {
    failures: Mutex<Vec<(u16, String)>>,
}

impl SubsystemManager for RecordingManager {
    fn fail(&self, code: u16, reason: &str) {
        self.failures.lock().unwrap().push((code, reason.to_string()));
    }
}

#[test]
fn test_static_clients_are_probed_on_registered_transports() {
    registry::init();
    let global = MIF_REGISTRY.try_get().unwrap();

    assert!(global.lock().driver_names().any(|name| name == "static_client"));
    global.lock().probe_transport("pcie0", pcie()).unwrap();
    assert_eq!(STATIC_PROBES.load(Ordering::SeqCst), 1);

    // Initialising twice keeps the first registry.
    registry::init();
    assert_eq!(global.lock().transport_ids().collect::<Vec<_>>(), ["pcie0"]);

    let removed = global.lock().remove_transport("pcie0").unwrap();
    assert_eq!(removed.kind(), BackendKind::Pcie);
}

#[test]
fn test_refused_suspend_resumes_the_rest() {
    let resumed = Arc::new(AtomicUsize::new(0));
    let first = platform();
    let counter = resumed.clone();
    first
        .register_suspend_handlers(
            Arc::new(|| Ok(())),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    let second = platform();
    second
        .register_suspend_handlers(Arc::new(|| Err(MifError::Unsupported)), Arc::new(|| {}))
        .unwrap();

    let mut registry = MifRegistry::new();
    registry.probe_transport("wlbt0", first).unwrap();
    registry.probe_transport("wlbt1", second).unwrap();

    assert_eq!(registry.suspend_all(), Err(MifError::Unsupported));
    assert_eq!(resumed.load(Ordering::SeqCst), 1);

    registry.resume_all();
    assert_eq!(resumed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_pcie_reset_requests_escalate_once() {
    let mif = pcie();
    mif.map().unwrap();
    let manager = Arc::new(RecordingManager::default());
    let monitor = PanicMonitor::new(manager.clone(), Arc::new(FakeClock::new()));
    monitor.init(&*mif);

    mif.emulate_firmware_interrupt(RESET_REQUEST_SOURCE).unwrap();
    mif.emulate_firmware_interrupt(RESET_REQUEST_SOURCE).unwrap();

    assert_eq!(
        *manager.failures.lock().unwrap(),
        vec![(PANIC_CODE_FW, "reset request from WLBT".to_string())]
    );

    monitor.rearm();
    mif.emulate_firmware_interrupt(RESET_REQUEST_SOURCE).unwrap();
    assert_eq!(manager.failures.lock().unwrap().len(), 2);

    monitor.deinit(&*mif);
    mif.emulate_firmware_interrupt(RESET_REQUEST_SOURCE).unwrap();
    assert_eq!(monitor.reports().len(), 2);
}

#[test]
fn test_boot_failure_is_reported_as_host_panic() {
    let manager = Arc::new(RecordingManager::default());
    let monitor = PanicMonitor::new(manager.clone(), Arc::new(FakeClock::new()));

    monitor.report_boot_failure(&MifError::NoDevice { what: "BAR0 signature" });

    let failures = manager.failures.lock().unwrap();
    assert_eq!(failures[0].0, 0x8000);
    assert_eq!(
        failures[0].1,
        "boot failed: device not responding: BAR0 signature"
    );
}
