//! Network attached library assembly.
//!
//! Builds vendor neutral [`Library`] records for an ACSLS managed
//! library: drives reported by the library manager are matched to the
//! locally discovered drives by serial number and grouped per media
//! type - a mixed media library is handled as one library (and later
//! one parameter file) per media type, with only the drives of that
//! type attached.

use rmc_api_types::{
    AcsDrive, Drive, Library, StkCap, StkDevice, StkHostInfo, StkParam,
};
use rmc_tools::list_hash::ListHash;

use crate::Result;

use super::{AcsClient, AcsTransport, SsiDaemon};

/// Equipment type of an ACSLS network attached library.
pub const STK_EQU_TYPE: &str = "sk";

fn devpath_for_drive(acs_drive: &AcsDrive, local: &Drive) -> StkDevice {
    StkDevice {
        path: local
            .alternate_paths
            .first()
            .cloned()
            .unwrap_or_else(|| local.path.clone()),
        acs: acs_drive.acs.trim().parse().unwrap_or(0),
        lsm: acs_drive.lsm.trim().parse().unwrap_or(0),
        panel: acs_drive.panel.trim().parse().unwrap_or(0),
        drive: acs_drive.drive.trim().parse().unwrap_or(0),
        shared: false,
    }
}

/// Assemble the library records of one ACSLS server.
///
/// `local_drives` are the standalone drives found by SCSI discovery
/// that are not yet under catalog control; an ACSLS drive without a
/// matching local drive is skipped (it belongs to another host).
pub fn assemble_stk_libraries<T: AcsTransport>(
    client: &mut AcsClient<T>,
    host_info: &StkHostInfo,
    local_drives: &[Drive],
) -> Result<Vec<Library>> {
    let acs_drives = client.drives()?;

    // group drives and their parameter file device entries per media
    // type
    let mut drive_groups: ListHash<Drive> = ListHash::new();
    let mut devpath_groups: ListHash<StkDevice> = ListHash::new();

    for acs_drive in &acs_drives {
        let local = match local_drives
            .iter()
            .find(|d| d.serial_no == acs_drive.serial_num)
        {
            Some(local) => local,
            None => {
                log::info!(
                    "ACSLS drive {} has no local device path, skipping",
                    acs_drive.serial_num
                );
                continue;
            }
        };

        let mut drive = local.clone();
        if !acs_drive.volume.trim().is_empty() {
            drive.loaded_vsn = Some(acs_drive.volume.trim().to_string());
        }

        let equ_type = drive.equ_type.clone();
        devpath_groups.list_put(&equ_type, devpath_for_drive(acs_drive, local));
        drive_groups.list_put(&equ_type, drive);
    }

    // a single CAP is carried in the parameter file, used to designate
    // where exported volumes go
    let cap = client
        .caps()?
        .first()
        .map(|cap| StkCap {
            acs: cap.acs,
            lsm: cap.lsm,
            cap: cap.cap,
        })
        .unwrap_or_default();

    let mut libraries = Vec::new();

    for (equ_type, drives) in drive_groups.drain() {
        let device_list = devpath_groups.remove(&equ_type).unwrap_or_default();

        let param = StkParam {
            hostname: host_info.hostname.clone(),
            access: host_info.access.clone(),
            portnum: host_info.portnum.trim().parse().unwrap_or(0),
            ssi_host: host_info.ssi_host.clone(),
            ssi_inet_portnum: -1,
            csi_hostport: -1,
            cap,
            capacity_list: Vec::new(),
            device_list,
        };

        libraries.push(Library {
            path: String::new(),
            serial_no: String::new(),
            vendor_id: "STK".to_string(),
            product_id: String::new(),
            firmware: String::new(),
            equ_type: STK_EQU_TYPE.to_string(),
            eq: None,
            alternate_paths: Vec::new(),
            drives,
            stk_param: Some(param),
        });
    }

    Ok(libraries)
}

/// Discover the configuration of an ACSLS server: start the SSI,
/// query its drives and CAPs, and assemble per-media-type library
/// records.
pub fn discover_stk<T: AcsTransport>(
    daemon: &mut SsiDaemon,
    client: &mut AcsClient<T>,
    host_info: &StkHostInfo,
    local_drives: &[Drive],
) -> Result<Vec<Library>> {
    daemon.start()?;
    assemble_stk_libraries(client, host_info, local_drives)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acsls::{AcsPacket, AcsResponseType, AcsStatus};
    use crate::Error;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct CannedTransport {
        exchanges: VecDeque<Vec<AcsPacket>>,
        current: VecDeque<AcsPacket>,
        seq: u16,
    }

    impl CannedTransport {
        fn new(exchanges: Vec<Vec<AcsPacket>>) -> Self {
            Self {
                exchanges: exchanges.into(),
                current: VecDeque::new(),
                seq: 0,
            }
        }
    }

    impl AcsTransport for CannedTransport {
        fn display(&mut self, seq: u16, _request: &str) -> Result<()> {
            self.seq = seq;
            self.current = self
                .exchanges
                .pop_front()
                .ok_or_else(|| Error::ProtocolError("unexpected request".to_string()))?
                .into();
            Ok(())
        }

        fn response(&mut self, _timeout: Duration) -> Result<AcsPacket> {
            let mut packet = self
                .current
                .pop_front()
                .ok_or_else(|| Error::Timeout("no more packets".to_string()))?;
            packet.seq = self.seq;
            Ok(packet)
        }
    }

    fn final_packet(xml: &str) -> Vec<AcsPacket> {
        vec![AcsPacket {
            seq: 0,
            response_type: AcsResponseType::Final,
            status: AcsStatus::Success,
            xml: xml.to_string(),
        }]
    }

    fn drive_xml(rows: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from("<response><data>");
        for (acs, serial, volume) in rows {
            xml.push_str("<r>");
            for value in [
                *acs, "1", "2", "3", "online", "available", *volume, "T10000C", "0", *serial,
                "operative",
            ] {
                xml.push_str(&format!("<f maxlen=\"{}\">{}</f>", value.len().max(1), value));
            }
            xml.push_str("</r>");
        }
        xml.push_str("</data></response>");
        xml
    }

    fn cap_xml() -> String {
        "<data><r><f maxlen=\"3\">0</f><f maxlen=\"3\">1</f>\
         <f maxlen=\"3\">2</f></r></data>"
            .to_string()
    }

    fn local_drive(serial: &str, path: &str, equ_type: &str) -> Drive {
        Drive {
            path: path.to_string(),
            serial_no: serial.to_string(),
            equ_type: equ_type.to_string(),
            alternate_paths: vec![path.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn assembles_one_library_per_media_type() -> Result<()> {
        let transport = CannedTransport::new(vec![
            final_packet(&drive_xml(&[
                ("0", "DRV1", " "),
                ("0", "DRV2", "VOL001"),
                ("0", "FOREIGN", " "),
            ])),
            final_packet(&cap_xml()),
        ]);
        let mut client = AcsClient::new(transport);

        let local = vec![
            local_drive("DRV1", "/dev/rmt/0cbn", "li"),
            local_drive("DRV2", "/dev/rmt/1cbn", "ti"),
        ];

        let host_info = StkHostInfo {
            hostname: "acsls1".to_string(),
            portnum: "50004".to_string(),
            ..Default::default()
        };

        let mut libraries = assemble_stk_libraries(&mut client, &host_info, &local)?;
        libraries.sort_by(|a, b| a.drives[0].equ_type.cmp(&b.drives[0].equ_type));

        // one library per media type, the foreign drive is skipped
        assert_eq!(libraries.len(), 2);

        let li = &libraries[0];
        assert_eq!(li.equ_type, "sk");
        assert_eq!(li.drives.len(), 1);
        assert_eq!(li.drives[0].serial_no, "DRV1");
        assert!(li.drives[0].loaded_vsn.is_none());

        let param = li.stk_param.as_ref().unwrap();
        assert_eq!(param.hostname, "acsls1");
        assert_eq!(param.portnum, 50004);
        assert_eq!(param.cap, StkCap { acs: 0, lsm: 1, cap: 2 });
        assert_eq!(param.device_list.len(), 1);
        assert_eq!(param.device_list[0].path, "/dev/rmt/0cbn");

        let ti = &libraries[1];
        assert_eq!(ti.drives[0].loaded_vsn.as_deref(), Some("VOL001"));
        Ok(())
    }
}
