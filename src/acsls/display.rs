//! Display request templates.
//!
//! Each query type maps to one fixed XML request. The `%s` slot is
//! filled with the item identifier ("*" selects all items of the
//! requested type).

/// ACSLS display query types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryType {
    Cap,
    Cell,
    Drive,
    Lock,
    Lsm,
    Panel,
    Pool,
    Volume,
    VolumeByMedia,
    VolumeCleaning,
    VolumeAccessed,
    VolumeEntered,
}

const XMLREQ_CAP: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>cap</token><token>%s</token>\
    <token>-f</token><token>acs</token><token>lsm</token>\
    <token>cap</token>\
    </display></request>";

const XMLREQ_CELL: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>cell</token><token>%s</token>\
    <token>-f</token><token>status</token>\
    </display></request>";

const XMLREQ_DRIVE: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>drive</token><token>%s</token>\
    <token>-f</token><token>status</token><token>state</token>\
    <token>volume</token><token>type</token><token>lock</token>\
    <token>serial_num</token><token>condition</token>\
    </display></request>";

const XMLREQ_LOCK: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>lock</token><token>%s</token>\
    </display></request>";

const XMLREQ_LSM: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>lsm</token><token>%s</token>\
    <token>-f</token><token>status</token><token>state</token>\
    <token>free_cells</token><token>type</token>\
    <token>serial_num</token>\
    <token>condition</token><token>door_status</token>\
    </display></request>";

const XMLREQ_PANEL: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>panel</token><token>%s</token>\
    </display></request>";

const XMLREQ_POOL: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>pool</token><token>%s</token>\
    </display></request>";

const XMLREQ_VOL: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>volume</token><token>%s</token>\
    </display></request>";

const XMLREQ_VOL_BY_MEDIA: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>volume</token><token>*</token>\
    <token>-media</token><token>%s</token>\
    </display></request>";

const XMLREQ_VOL_CLEANING: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>volume</token><token>%s</token>\
    <token>-clean</token>\
    </display></request>";

const XMLREQ_VOL_ACCESSED: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>volume</token><token>*</token>\
    <token>-access</token><token>%s</token>\
    </display></request>";

const XMLREQ_VOL_ENTERED: &str = "<request type='DISPLAY'><display>\
    <token>display</token><token>volume</token><token>*</token>\
    <token>-entry</token><token>%s</token>\
    </display></request>";

impl QueryType {
    pub fn name(&self) -> &'static str {
        match self {
            QueryType::Cap => "cap",
            QueryType::Cell => "cell",
            QueryType::Drive => "drive",
            QueryType::Lock => "lock",
            QueryType::Lsm => "lsm",
            QueryType::Panel => "panel",
            QueryType::Pool => "pool",
            QueryType::Volume => "volume",
            QueryType::VolumeByMedia => "volume-by-media",
            QueryType::VolumeCleaning => "volume-cleaning",
            QueryType::VolumeAccessed => "volume-accessed",
            QueryType::VolumeEntered => "volume-entered",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            QueryType::Cap => XMLREQ_CAP,
            QueryType::Cell => XMLREQ_CELL,
            QueryType::Drive => XMLREQ_DRIVE,
            QueryType::Lock => XMLREQ_LOCK,
            QueryType::Lsm => XMLREQ_LSM,
            QueryType::Panel => XMLREQ_PANEL,
            QueryType::Pool => XMLREQ_POOL,
            QueryType::Volume => XMLREQ_VOL,
            QueryType::VolumeByMedia => XMLREQ_VOL_BY_MEDIA,
            QueryType::VolumeCleaning => XMLREQ_VOL_CLEANING,
            QueryType::VolumeAccessed => XMLREQ_VOL_ACCESSED,
            QueryType::VolumeEntered => XMLREQ_VOL_ENTERED,
        }
    }

    /// CELL and LOCK are defined in the request table but have no
    /// response parser yet.
    pub fn has_parser(&self) -> bool {
        !matches!(self, QueryType::Cell | QueryType::Lock)
    }
}

/// Build the XML request for a query. Without an argument, information
/// about all items of the requested type is fetched.
pub fn build_request(query: QueryType, arg: Option<&str>) -> String {
    let arg = match arg {
        Some(arg) if !arg.is_empty() => arg,
        _ => "*",
    };
    query.template().replace("%s", arg)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_substitution() {
        let req = build_request(QueryType::Volume, None);
        assert!(req.contains("<token>volume</token><token>*</token>"));

        let req = build_request(QueryType::VolumeByMedia, Some("LTO-400G"));
        assert!(req.contains("<token>-media</token><token>LTO-400G</token>"));
        // the item slot of the by-media query is fixed to all volumes
        assert!(req.contains("<token>volume</token><token>*</token>"));
    }

    #[test]
    fn cell_and_lock_have_no_parser() {
        assert!(!QueryType::Cell.has_parser());
        assert!(!QueryType::Lock.has_parser());
        assert!(QueryType::Volume.has_parser());
        assert!(QueryType::Panel.has_parser());
    }
}
