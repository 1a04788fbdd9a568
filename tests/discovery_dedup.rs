//! Multi-path library discovery.

use std::collections::HashMap;

use rmc_scsi::{DeviceId, DeviceIdentity};

use rmcatalog::discovery::{discover_drives, discover_libraries, StaticProber};
use rmcatalog::mediatype::InquiryEntry;

fn changer_identity(serial: &str) -> DeviceIdentity {
    DeviceIdentity {
        peripheral_type: 8,
        vendor: "STK".to_string(),
        product: "L700".to_string(),
        revision: "0100".to_string(),
        serial: serial.to_string(),
        device_ids: Vec::new(),
    }
}

fn inquiry_table() -> Vec<InquiryEntry> {
    vec![InquiryEntry {
        vendor: "STK".to_string(),
        product: "L700".to_string(),
        sam_id: "rb".to_string(),
    }]
}

#[test]
fn duplicate_paths_collapse_into_one_library() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut identities = HashMap::new();
    // two OS device nodes lead to the same physical library
    identities.insert("/dev/samst/c0t1u0".to_string(), changer_identity("SN123"));
    identities.insert("/dev/samst/c1t1u0".to_string(), changer_identity("SN123"));

    let mut drive_serials = HashMap::new();
    drive_serials.insert(
        "/dev/samst/c0t1u0".to_string(),
        vec!["DRVA".to_string(), "DRVB".to_string()],
    );
    drive_serials.insert(
        "/dev/samst/c1t1u0".to_string(),
        vec!["DRVA".to_string(), "DRVB".to_string()],
    );

    let mut prober = StaticProber {
        identities,
        drive_serials,
    };

    let paths = vec![
        "/dev/samst/c0t1u0".to_string(),
        "/dev/samst/c1t1u0".to_string(),
    ];
    let libraries =
        discover_libraries(&mut prober, &paths, &[], &inquiry_table()).unwrap();

    assert_eq!(libraries.len(), 1);

    let library = &libraries[0];
    assert_eq!(library.serial_no, "SN123");
    assert_eq!(library.equ_type, "rb");
    // both node paths collected, in first-seen order
    assert_eq!(
        library.alternate_paths,
        vec!["/dev/samst/c0t1u0", "/dev/samst/c1t1u0"]
    );
    // the duplicate record contributed no extra drives
    assert_eq!(library.drives.len(), 2);
}

#[test]
fn multipath_drives_keep_wwn_identifiers() {
    let mut identity = DeviceIdentity {
        peripheral_type: 1,
        vendor: "IBM".to_string(),
        product: "ULTRIUM-TD5".to_string(),
        revision: "B170".to_string(),
        serial: "DRV999".to_string(),
        device_ids: vec![DeviceId {
            id_type: 3,
            value: "500104f000ba9a10".to_string(),
        }],
    };

    let mut identities = HashMap::new();
    identities.insert("/dev/rmt/0cbn".to_string(), identity.clone());
    identity.device_ids.push(DeviceId {
        id_type: 3,
        value: "500104f000ba9a11".to_string(),
    });
    identities.insert("/dev/rmt/1cbn".to_string(), identity);

    let mut prober = StaticProber {
        identities,
        drive_serials: HashMap::new(),
    };

    let paths = vec!["/dev/rmt/0cbn".to_string(), "/dev/rmt/1cbn".to_string()];
    let drives = discover_drives(&mut prober, &paths, &[], &[]).unwrap();

    // deduplicated by serial, not by descriptor content
    assert_eq!(drives.len(), 1);
    assert_eq!(drives[0].serial_no, "DRV999");
    assert_eq!(
        drives[0].alternate_paths,
        vec!["/dev/rmt/0cbn", "/dev/rmt/1cbn"]
    );
    // the first sighting's identifiers win
    assert_eq!(drives[0].wwn_ids, vec!["500104f000ba9a10"]);
}
