//! Request/response exchange against the SSI transport.

use std::time::{Duration, Instant};

use rmc_api_types::{AcsCap, AcsDrive, AcsLsm, StkPool, StkVolume};

use crate::{Error, Result};

use super::{
    build_request, parse_cap_response, parse_drive_response, parse_format_fields,
    parse_kv_rows, parse_lsm_response, parse_pool_response, parse_volume_response, QueryType,
};

/// Bound on the wait for the packets of one request. This is the only
/// explicit timeout in the whole subsystem; a query that exceeds it
/// fails rather than hanging forever.
pub const ACS_RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Response packet kinds of one request exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcsResponseType {
    Acknowledge,
    Intermediate,
    Final,
}

/// Packet level status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcsStatus {
    Success,
    Cancelled,
    DatabaseError,
    ProcessFailure,
    LibraryBusy,
    LibraryFailure,
    LibraryNotAvailable,
    InvalidOption,
    InvalidType,
    InvalidValue,
}

impl AcsStatus {
    /// True when a final packet with this status carries no variable
    /// part - parsing stops with whatever has been accumulated.
    pub fn no_variable_part(&self) -> bool {
        !matches!(self, AcsStatus::Success)
    }
}

/// One packet received from the SSI.
#[derive(Clone, Debug)]
pub struct AcsPacket {
    /// Sequence number echoed from the request
    pub seq: u16,
    pub response_type: AcsResponseType,
    pub status: AcsStatus,
    /// XML payload, empty when the packet carries none
    pub xml: String,
}

/// The ACSAPI transport boundary.
///
/// The production implementation hands requests to the vendor client
/// library which relays them through the SSI; tests substitute canned
/// packet streams.
pub trait AcsTransport {
    /// Send a display request.
    fn display(&mut self, seq: u16, request: &str) -> Result<()>;

    /// Receive the next response packet, waiting at most `timeout`.
    fn response(&mut self, timeout: Duration) -> Result<AcsPacket>;
}

/// Typed results of a display query.
#[derive(Clone, Debug)]
pub enum DisplayData {
    Volumes(Vec<StkVolume>),
    Drives(Vec<AcsDrive>),
    Lsms(Vec<AcsLsm>),
    Caps(Vec<AcsCap>),
    Pools(Vec<StkPool>),
    /// Generic key/value rows (panel query), interpreted through the
    /// format header of the same exchange
    Rows(Vec<Vec<(String, String)>>),
}

/// ACSLS display client.
///
/// Sequence numbers are generated per request from a monotonically
/// increasing counter, so concurrent clients sharing one SSI can match
/// responses to their own requests.
pub struct AcsClient<T> {
    transport: T,
    next_seq: u16,
}

impl<T: AcsTransport> AcsClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_seq: 0,
        }
    }

    fn next_seq(&mut self) -> u16 {
        // skip 0, some SSI versions treat it as "no sequence"
        self.next_seq = self.next_seq.checked_add(1).unwrap_or(1);
        self.next_seq
    }

    /// Drive one request exchange: send, then consume packets until
    /// the final one arrives, feeding every payload to `handle`.
    fn exchange<F>(&mut self, query: QueryType, arg: Option<&str>, mut handle: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let seq = self.next_seq();
        let request = build_request(query, arg);
        self.transport.display(seq, &request)?;

        let deadline = Instant::now() + ACS_RESPONSE_TIMEOUT;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!("display {} response", query.name())));
            }

            let packet = self.transport.response(deadline - now)?;

            if packet.seq != seq {
                return Err(Error::ProtocolError(format!(
                    "response sequence mismatch: sent {}, got {}",
                    seq, packet.seq
                )));
            }

            match packet.response_type {
                AcsResponseType::Acknowledge => {
                    // not user visible data, the echoed request context
                    // is only validated and logged
                    log::debug!("display {} acknowledged ({:?})", query.name(), packet.status);
                }
                AcsResponseType::Intermediate => {
                    handle(&packet.xml)?;
                }
                AcsResponseType::Final => {
                    if !packet.status.no_variable_part() {
                        handle(&packet.xml)?;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Run a display query and decode the accumulated rows.
    pub fn display_info(&mut self, query: QueryType, arg: Option<&str>) -> Result<DisplayData> {
        if !query.has_parser() {
            return Err(Error::UnsupportedQuery(query.name()));
        }

        match query {
            QueryType::Cap => {
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    rows.extend(parse_cap_response(xml)?);
                    Ok(())
                })?;
                Ok(DisplayData::Caps(rows))
            }
            QueryType::Drive => {
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    rows.extend(parse_drive_response(xml)?);
                    Ok(())
                })?;
                Ok(DisplayData::Drives(rows))
            }
            QueryType::Lsm => {
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    rows.extend(parse_lsm_response(xml)?);
                    Ok(())
                })?;
                Ok(DisplayData::Lsms(rows))
            }
            QueryType::Pool => {
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    rows.extend(parse_pool_response(xml)?);
                    Ok(())
                })?;
                Ok(DisplayData::Pools(rows))
            }
            QueryType::Panel => {
                // two phase exchange: a format header names the fields,
                // the data packets that follow are interpreted with it
                let mut format: Option<Vec<String>> = None;
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    if xml.contains("<format>") {
                        format = Some(parse_format_fields(xml)?);
                    } else if xml.contains("<data>") {
                        let fields = format.as_ref().ok_or_else(|| {
                            Error::ProtocolError(
                                "data packet before format header".to_string(),
                            )
                        })?;
                        rows.extend(parse_kv_rows(xml, fields)?);
                    }
                    Ok(())
                })?;
                Ok(DisplayData::Rows(rows))
            }
            QueryType::Volume
            | QueryType::VolumeByMedia
            | QueryType::VolumeCleaning
            | QueryType::VolumeAccessed
            | QueryType::VolumeEntered => {
                let mut rows = Vec::new();
                self.exchange(query, arg, |xml| {
                    rows.extend(parse_volume_response(xml)?);
                    Ok(())
                })?;
                Ok(DisplayData::Volumes(rows))
            }
            QueryType::Cell | QueryType::Lock => Err(Error::UnsupportedQuery(query.name())),
        }
    }

    /// All volumes known to the library manager.
    pub fn volumes(&mut self) -> Result<Vec<StkVolume>> {
        match self.display_info(QueryType::Volume, None)? {
            DisplayData::Volumes(vols) => Ok(vols),
            _ => unreachable!(),
        }
    }

    /// All volumes of one StorageTek media type.
    pub fn volumes_by_media(&mut self, stk_media: &str) -> Result<Vec<StkVolume>> {
        match self.display_info(QueryType::VolumeByMedia, Some(stk_media))? {
            DisplayData::Volumes(vols) => Ok(vols),
            _ => unreachable!(),
        }
    }

    /// All drives, with their serial numbers and loaded volumes.
    pub fn drives(&mut self) -> Result<Vec<AcsDrive>> {
        match self.display_info(QueryType::Drive, None)? {
            DisplayData::Drives(drives) => Ok(drives),
            _ => unreachable!(),
        }
    }

    /// All library storage modules.
    pub fn lsms(&mut self) -> Result<Vec<AcsLsm>> {
        match self.display_info(QueryType::Lsm, None)? {
            DisplayData::Lsms(lsms) => Ok(lsms),
            _ => unreachable!(),
        }
    }

    /// All cartridge access ports.
    pub fn caps(&mut self) -> Result<Vec<AcsCap>> {
        match self.display_info(QueryType::Cap, None)? {
            DisplayData::Caps(caps) => Ok(caps),
            _ => unreachable!(),
        }
    }

    /// All scratch pools.
    pub fn pools(&mut self) -> Result<Vec<StkPool>> {
        match self.display_info(QueryType::Pool, None)? {
            DisplayData::Pools(pools) => Ok(pools),
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;

    struct MockTransport {
        sent: Vec<(u16, String)>,
        packets: VecDeque<AcsPacket>,
    }

    impl MockTransport {
        fn new(packets: Vec<AcsPacket>) -> Self {
            Self {
                sent: Vec::new(),
                packets: packets.into(),
            }
        }
    }

    impl AcsTransport for MockTransport {
        fn display(&mut self, seq: u16, request: &str) -> Result<()> {
            self.sent.push((seq, request.to_string()));
            // echo the request sequence into the canned packets
            for packet in self.packets.iter_mut() {
                packet.seq = seq;
            }
            Ok(())
        }

        fn response(&mut self, _timeout: Duration) -> Result<AcsPacket> {
            self.packets
                .pop_front()
                .ok_or_else(|| Error::Timeout("no more packets".to_string()))
        }
    }

    fn packet(response_type: AcsResponseType, status: AcsStatus, xml: &str) -> AcsPacket {
        AcsPacket {
            seq: 0,
            response_type,
            status,
            xml: xml.to_string(),
        }
    }

    fn volume_xml(vsns: &[&str]) -> String {
        let mut xml = String::from("<response><data>");
        for vsn in vsns {
            xml.push_str(&format!("<r><f maxlen=\"6\">{}</f>", vsn));
            for value in ["0", "1", "2", "3", "4", "5"] {
                xml.push_str(&format!("<f maxlen=\"5\">{}</f>", value));
            }
            xml.push_str(
                "<f maxlen=\"9\">home</f><f maxlen=\"9\">LTO-400G</f>\
                 <f maxlen=\"9\">data</f></r>",
            );
        }
        xml.push_str("</data></response>");
        xml
    }

    #[test]
    fn ack_intermediate_final_accumulation() -> Result<()> {
        let transport = MockTransport::new(vec![
            packet(AcsResponseType::Acknowledge, AcsStatus::Success, ""),
            packet(
                AcsResponseType::Intermediate,
                AcsStatus::Success,
                &volume_xml(&["VOL001", "VOL002"]),
            ),
            packet(
                AcsResponseType::Final,
                AcsStatus::Success,
                &volume_xml(&["VOL003"]),
            ),
        ]);

        let mut client = AcsClient::new(transport);
        let vols = client.volumes()?;

        assert_eq!(vols.len(), 3);
        assert_eq!(vols[0].vsn, "VOL001");
        assert_eq!(vols[2].vsn, "VOL003");
        Ok(())
    }

    #[test]
    fn final_without_variable_part_stops_parsing() -> Result<()> {
        let transport = MockTransport::new(vec![
            packet(AcsResponseType::Acknowledge, AcsStatus::Success, ""),
            packet(
                AcsResponseType::Intermediate,
                AcsStatus::Success,
                &volume_xml(&["VOL001"]),
            ),
            // final carries an error status and no payload
            packet(AcsResponseType::Final, AcsStatus::LibraryBusy, ""),
        ]);

        let mut client = AcsClient::new(transport);
        let vols = client.volumes()?;
        assert_eq!(vols.len(), 1);
        Ok(())
    }

    #[test]
    fn sequence_mismatch_is_protocol_error() {
        let mut transport = MockTransport::new(vec![packet(
            AcsResponseType::Final,
            AcsStatus::Success,
            "",
        )]);
        // sabotage: canned packet claims a foreign sequence number
        transport.packets[0].seq = 4711;

        struct FixedSeq(MockTransport);
        impl AcsTransport for FixedSeq {
            fn display(&mut self, seq: u16, request: &str) -> Result<()> {
                self.0.sent.push((seq, request.to_string()));
                Ok(())
            }
            fn response(&mut self, timeout: Duration) -> Result<AcsPacket> {
                self.0.response(timeout)
            }
        }

        let mut client = AcsClient::new(FixedSeq(transport));
        assert!(matches!(
            client.volumes(),
            Err(Error::ProtocolError(_))
        ));
    }

    #[test]
    fn sequence_numbers_are_unique_per_request() -> Result<()> {
        let transport = MockTransport::new(vec![
            packet(AcsResponseType::Final, AcsStatus::Success, &volume_xml(&[])),
            packet(AcsResponseType::Final, AcsStatus::Success, &volume_xml(&[])),
        ]);

        let mut client = AcsClient::new(transport);
        client.volumes()?;
        client.volumes()?;

        let sent = &client.transport.sent;
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].0, sent[1].0);
        Ok(())
    }

    #[test]
    fn unsupported_queries_error_out() {
        let transport = MockTransport::new(vec![]);
        let mut client = AcsClient::new(transport);

        for query in [QueryType::Cell, QueryType::Lock] {
            match client.display_info(query, None) {
                Err(Error::UnsupportedQuery(name)) => assert_eq!(name, query.name()),
                other => panic!("expected UnsupportedQuery, got {:?}", other.map(|_| ())),
            }
        }
        // no request must have been sent
        assert!(client.transport.sent.is_empty());
    }

    #[test]
    fn panel_format_then_data() -> Result<()> {
        let format_xml = "<response><format><fields>\
            <field name=\"acs\" format=\"int\" maxlen=\"3\"/>\
            <field name=\"panel\" format=\"int\" maxlen=\"5\"/>\
            </fields></format></response>";
        let data_xml = "<response><data>\
            <r><f maxlen=\"3\">0</f><f maxlen=\"5\">10</f></r>\
            </data></response>";

        let transport = MockTransport::new(vec![
            packet(AcsResponseType::Acknowledge, AcsStatus::Success, ""),
            packet(AcsResponseType::Intermediate, AcsStatus::Success, format_xml),
            packet(AcsResponseType::Final, AcsStatus::Success, data_xml),
        ]);

        let mut client = AcsClient::new(transport);
        match client.display_info(QueryType::Panel, None)? {
            DisplayData::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0][0], ("acs".to_string(), "0".to_string()));
                assert_eq!(rows[0][1], ("panel".to_string(), "10".to_string()));
            }
            other => panic!("expected rows, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn exhausted_transport_times_out() {
        let transport = MockTransport::new(vec![packet(
            AcsResponseType::Acknowledge,
            AcsStatus::Success,
            "",
        )]);

        let mut client = AcsClient::new(transport);
        assert!(matches!(client.volumes(), Err(Error::Timeout(_))));
    }
}
