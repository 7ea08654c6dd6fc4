//! Lifecycle integration tests
//!
//! Exercises the manager/device/session layers against the instrumented
//! in-memory backend: reference-count and handle symmetry, guaranteed
//! cleanup on failure paths, filter semantics, and stale-identity opens.

use std::rc::Rc;

use hostusb::test_support::{MockBackend, MockDevice};
use hostusb::{DeviceId, FromOpenHandle, UsbError, UsbManager, UsbSession};

fn manager_with(devices: Vec<MockDevice>) -> UsbManager<MockBackend> {
    UsbManager::with_backend(MockBackend::new(devices))
}

fn two_device_manager() -> UsbManager<MockBackend> {
    manager_with(vec![
        MockDevice::new(1, 4, 0x04c5, 0x11a6),
        MockDevice::new(3, 1, 0x1234, 0x5678),
    ])
}

/// Session type that always fails construction, for fault injection at
/// the open boundary.
struct RefusingSession;

impl FromOpenHandle<MockBackend> for RefusingSession {
    fn from_open_handle(
        _backend: Rc<MockBackend>,
        _device: usize,
        _handle: usize,
    ) -> Result<Self, UsbError> {
        Err(UsbError::NativeCall {
            operation: "session_init",
            code: -99,
        })
    }
}

mod enumeration {
    use super::*;

    #[test]
    fn test_identities_are_unique_and_derived_from_topology() {
        let manager = two_device_manager();
        let devices = manager.list_devices().unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id(), DeviceId::from_parts(1, 4));
        assert_eq!(devices[1].id(), DeviceId::from_parts(3, 1));
        assert_ne!(devices[0].id(), devices[1].id());
        assert_eq!(devices[0].id().0, (1 << 8) | 4);
    }

    #[test]
    fn test_reference_count_symmetry_after_drop() {
        let manager = two_device_manager();
        {
            let devices = manager.list_devices().unwrap();
            let counters = manager.backend().counters();
            assert_eq!(counters.refs, 2);
            assert_eq!(counters.unrefs, 0);
            drop(devices);
        }
        let counters = manager.backend().counters();
        assert_eq!(counters.refs, 2);
        assert_eq!(counters.unrefs, 2);
    }

    #[test]
    fn test_list_freed_exactly_once_per_enumeration() {
        let manager = two_device_manager();
        let _ = manager.list_devices().unwrap();
        let _ = manager.find_devices(None, None).unwrap();
        let counters = manager.backend().counters();
        assert_eq!(counters.lists, 2);
        assert_eq!(counters.list_frees, 2);
    }

    #[test]
    fn test_mid_enumeration_failure_discards_partial_results() {
        let mut failing = MockDevice::new(3, 1, 0x1234, 0x5678);
        failing.descriptor_failure = Some(-4);
        let manager = manager_with(vec![MockDevice::new(1, 4, 0x04c5, 0x11a6), failing]);

        let err = manager.list_devices().unwrap_err();
        assert!(matches!(
            err,
            UsbError::DescriptorFetch {
                bus: 3,
                address: 1,
                code: -4
            }
        ));

        // The device constructed before the failure has been dropped and
        // its reference released; the list itself was still freed.
        let counters = manager.backend().counters();
        assert_eq!(counters.refs, counters.unrefs);
        assert_eq!(counters.list_frees, 1);
    }

    #[test]
    fn test_log_level_passed_through_to_backend() {
        let manager = two_device_manager();
        assert_eq!(manager.backend().log_level(), None);
        manager.set_log_level(hostusb::LogLevel::Debug);
        assert_eq!(
            manager.backend().log_level(),
            Some(hostusb::LogLevel::Debug)
        );
    }

    #[test]
    fn test_enumeration_failure_is_surfaced() {
        let mut backend = MockBackend::new(vec![]);
        backend.list_failure = Some(-1);
        let manager = UsbManager::with_backend(backend);
        assert!(matches!(
            manager.list_devices(),
            Err(UsbError::Enumeration(-1))
        ));
    }

    #[test]
    fn test_ref_released_when_descriptor_fetch_fails_for_only_device() {
        let mut failing = MockDevice::new(1, 1, 0x0000, 0x0000);
        failing.descriptor_failure = Some(-7);
        let manager = manager_with(vec![failing]);

        assert!(manager.list_devices().is_err());
        let counters = manager.backend().counters();
        assert_eq!(counters.refs, 1);
        assert_eq!(counters.unrefs, 1);
    }
}

mod filtering {
    use super::*;

    fn mixed_manager() -> UsbManager<MockBackend> {
        manager_with(vec![
            MockDevice::new(1, 2, 0x04c5, 0x11a6),
            MockDevice::new(1, 3, 0x04c5, 0x201d),
            MockDevice::new(2, 1, 0x1d6b, 0x0002),
        ])
    }

    #[test]
    fn test_vendor_only_filter_matches_all_products() {
        let manager = mixed_manager();
        let ids = manager.find_devices(Some(0x04c5), None).unwrap();
        assert_eq!(
            ids,
            vec![DeviceId::from_parts(1, 2), DeviceId::from_parts(1, 3)]
        );
    }

    #[test]
    fn test_no_filter_returns_every_device() {
        let manager = mixed_manager();
        let ids = manager.find_devices(None, None).unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_exact_filter_matches_one() {
        let manager = mixed_manager();
        let ids = manager.find_devices(Some(0x04c5), Some(0x201d)).unwrap();
        assert_eq!(ids, vec![DeviceId::from_parts(1, 3)]);
    }

    #[test]
    fn test_find_does_not_acquire_references() {
        let manager = mixed_manager();
        let _ = manager.find_devices(None, None).unwrap();
        assert_eq!(manager.backend().counters().refs, 0);
    }
}

mod sessions {
    use super::*;

    #[test]
    fn test_open_close_symmetry() {
        let manager = two_device_manager();
        let session = manager.open_session(DeviceId::from_parts(1, 4)).unwrap();
        assert!(session.is_some());

        let counters = manager.backend().counters();
        assert_eq!(counters.opens, 1);
        assert_eq!(counters.closes, 0);

        drop(session);
        let counters = manager.backend().counters();
        assert_eq!(counters.closes, 1);
    }

    #[test]
    fn test_stale_identity_open_returns_none() {
        let manager = two_device_manager();
        let session = manager.open_session(DeviceId(0x7f7f)).unwrap();
        assert!(session.is_none());

        // Nothing was opened, and the enumeration list was still freed.
        let counters = manager.backend().counters();
        assert_eq!(counters.opens, 0);
        assert_eq!(counters.list_frees, 1);
    }

    #[test]
    fn test_failed_session_construction_closes_handle() {
        let manager = two_device_manager();
        let result: Result<Option<RefusingSession>, _> = manager.open(DeviceId::from_parts(1, 4));

        assert!(matches!(
            result,
            Err(UsbError::NativeCall {
                operation: "session_init",
                code: -99
            })
        ));
        let counters = manager.backend().counters();
        assert_eq!(counters.opens, 1);
        assert_eq!(counters.closes, 1);
    }

    #[test]
    fn test_claim_released_exactly_once_on_drop() {
        let manager = two_device_manager();
        let mut session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        session.claim_interface(0).unwrap();
        assert_eq!(session.claimed_interface(), Some(0));
        drop(session);

        let counters = manager.backend().counters();
        assert_eq!(counters.claims, 1);
        assert_eq!(counters.releases, 1);
        assert_eq!(counters.closes, 1);
    }

    #[test]
    fn test_no_double_release_after_explicit_release() {
        let manager = two_device_manager();
        let mut session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        session.claim_interface(0).unwrap();
        session.release_interface(0).unwrap();
        assert_eq!(session.claimed_interface(), None);
        drop(session);

        let counters = manager.backend().counters();
        assert_eq!(counters.claims, 1);
        assert_eq!(counters.releases, 1);
    }

    #[test]
    fn test_failed_claim_leaves_state_unchanged() {
        let mut backend = MockBackend::new(vec![MockDevice::new(1, 4, 0x04c5, 0x11a6)]);
        backend.claim_failure = Some(-6);
        let manager = UsbManager::with_backend(backend);
        let mut session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        let err = session.claim_interface(0).unwrap_err();
        assert!(matches!(
            err,
            UsbError::NativeCall {
                operation: "claim_interface",
                code: -6
            }
        ));
        assert_eq!(session.claimed_interface(), None);

        // Nothing claimed, so drop must not attempt a release.
        drop(session);
        assert_eq!(manager.backend().counters().releases, 0);
    }

    #[test]
    fn test_drop_swallows_release_failure_and_still_closes() {
        let mut backend = MockBackend::new(vec![MockDevice::new(1, 4, 0x04c5, 0x11a6)]);
        backend.release_failure = Some(-1);
        let manager = UsbManager::with_backend(backend);
        let mut session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        session.claim_interface(0).unwrap();
        drop(session);

        let counters = manager.backend().counters();
        assert_eq!(counters.releases, 1);
        assert_eq!(counters.closes, 1);
    }

    #[test]
    fn test_configuration_round_trip() {
        let manager = two_device_manager();
        let mut session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        session.set_configuration(1).unwrap();
        assert_eq!(session.configuration().unwrap(), 1);
        assert_eq!(manager.backend().configuration(), 1);
    }

    #[test]
    fn test_get_configuration_failure_carries_operation_and_code() {
        let mut backend = MockBackend::new(vec![MockDevice::new(1, 4, 0x04c5, 0x11a6)]);
        backend.get_configuration_failure = Some(-5);
        let manager = UsbManager::with_backend(backend);
        let session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        let err = session.configuration().unwrap_err();
        assert_eq!(
            err.to_string(),
            "get_configuration failed (native code -5)"
        );
    }

    #[test]
    fn test_kernel_driver_query_mapping() {
        let devices = || vec![MockDevice::new(1, 4, 0x04c5, 0x11a6)];
        let id = DeviceId::from_parts(1, 4);

        for (raw, expected) in [(0, false), (1, true)] {
            let mut backend = MockBackend::new(devices());
            backend.kernel_driver_state = raw;
            let manager = UsbManager::with_backend(backend);
            let session = manager.open_session(id).unwrap().unwrap();
            assert_eq!(session.kernel_driver_active(0).unwrap(), expected);
        }

        let mut backend = MockBackend::new(devices());
        backend.kernel_driver_state = -3;
        let manager = UsbManager::with_backend(backend);
        let session = manager.open_session(id).unwrap().unwrap();
        assert!(matches!(
            session.kernel_driver_active(0),
            Err(UsbError::NativeCall {
                operation: "kernel_driver_active",
                code: -3
            })
        ));
    }

    #[test]
    fn test_open_failure_is_surfaced_as_native_call() {
        let mut failing = MockDevice::new(1, 4, 0x04c5, 0x11a6);
        failing.open_failure = Some(-3);
        let manager = manager_with(vec![failing]);

        let result: Result<Option<UsbSession<MockBackend>>, _> =
            manager.open(DeviceId::from_parts(1, 4));
        assert!(matches!(
            result,
            Err(UsbError::NativeCall {
                operation: "open",
                code: -3
            })
        ));
        assert_eq!(manager.backend().counters().closes, 0);
    }
}

mod descriptions {
    use super::*;

    fn described_device() -> MockDevice {
        let mut device = MockDevice::new(1, 4, 0x04c5, 0x11a6)
            .with_string(1, "Fujitsu")
            .with_string(2, "F-01A")
            .with_string(3, "SN000123");
        device.descriptor.manufacturer_index = 1;
        device.descriptor.product_index = 2;
        device.descriptor.serial_number_index = 3;
        device
    }

    #[test]
    fn test_describe_resolves_string_descriptors() {
        let manager = manager_with(vec![described_device()]);
        let devices = manager.list_devices().unwrap();
        let report = devices[0].describe(None);

        assert_eq!(report.manufacturer.as_deref(), Some("Fujitsu"));
        assert_eq!(report.product.as_deref(), Some("F-01A"));
        assert_eq!(report.serial_number.as_deref(), Some("SN000123"));
        assert_eq!(report.vendor_id, 0x04c5);
        assert_eq!(report.max_power_ma, 100);

        // The temporary handle used for string reads was closed.
        let counters = manager.backend().counters();
        assert_eq!(counters.opens, 1);
        assert_eq!(counters.closes, 1);
    }

    #[test]
    fn test_describe_omits_strings_when_open_fails() {
        let mut device = described_device();
        device.open_failure = Some(-3);
        let manager = manager_with(vec![device]);
        let devices = manager.list_devices().unwrap();
        let report = devices[0].describe(None);

        assert_eq!(report.manufacturer, None);
        assert_eq!(report.product, None);
        assert_eq!(report.serial_number, None);
        // Descriptor fields are still reported.
        assert_eq!(report.product_id, 0x11a6);
    }

    #[test]
    fn test_describe_reuses_supplied_session_handle() {
        let manager = manager_with(vec![described_device()]);
        let devices = manager.list_devices().unwrap();
        let session = manager
            .open_session(DeviceId::from_parts(1, 4))
            .unwrap()
            .unwrap();

        let report = devices[0].describe(Some(&session));
        assert_eq!(report.manufacturer.as_deref(), Some("Fujitsu"));

        // No temporary open: only the session's own handle exists.
        assert_eq!(manager.backend().counters().opens, 1);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let manager = manager_with(vec![described_device()]);
        let devices = manager.list_devices().unwrap();
        let json = serde_json::to_value(devices[0].describe(None)).unwrap();

        assert_eq!(json["vendor_id"], 0x04c5);
        assert_eq!(json["manufacturer"], "Fujitsu");
        assert_eq!(json["max_power_ma"], 100);
    }
}
