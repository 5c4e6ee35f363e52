//! Recognized CDR column set and the raw row type keyed by it.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

/// Every column the transformer reads. Header names outside this set are
/// ignored when a file is parsed.
pub const RECOGNIZED_COLUMNS: &[&str] = &[
    "cdrRecordType",
    "globalCallID_callManagerId",
    "globalCallID_callId",
    "globalCallId_ClusterID",
    "pkid",
    "dateTimeOrigination",
    "dateTimeConnect",
    "dateTimeDisconnect",
    "duration",
    // Calling party
    "callingPartyNumber",
    "callingPartyNumberPartition",
    "callingPartyNumber_uri",
    "callingPartyUnicodeLoginUserID",
    // Original / final called party
    "originalCalledPartyNumber",
    "originalCalledPartyNumberPartition",
    "originalCalledPartyNumber_uri",
    "originalCalledPartyPattern",
    "finalCalledPartyNumber",
    "finalCalledPartyNumberPartition",
    "finalCalledPartyNumber_uri",
    "finalCalledPartyPattern",
    "finalCalledPartyUnicodeLoginUserID",
    // Redirects
    "lastRedirectDn",
    "lastRedirectDnPartition",
    "lastRedirectDn_uri",
    "lastRedirectRedirectOnBehalfOf",
    "lastRedirectRedirectReason",
    "lastRedirectingPartyPattern",
    "lastRedirectingRoutingReason",
    // Origin leg
    "origLegCallIdentifier",
    "origNodeId",
    "origSpan",
    "origIpAddr",
    "origIpv4v6Addr",
    "origDeviceName",
    "origDeviceType",
    "origDeviceSessionID",
    "origPrecedenceLevel",
    "origDTMFMethod",
    "origConversationId",
    "origCallTerminationOnBehalfOf",
    "origRoutingReason",
    "origCalledPartyRedirectOnBehalfOf",
    "origCalledPartyRedirectReason",
    "origCause_location",
    "origCause_value",
    "origMediaCap_payloadCapability",
    "origMediaCap_maxFramesPerPacket",
    "origMediaCap_g723BitRate",
    "origMediaCap_Bandwidth",
    "origMediaCap_Bandwidth_Channel2",
    "origMediaTransportAddress_IP",
    "origMediaTransportAddress_Port",
    "origMediaTransportAddress_IP_Channel2",
    "origMediaTransportAddress_Port_Channel2",
    "origVideoCap_Codec",
    "origVideoCap_Bandwidth",
    "origVideoCap_Resolution",
    "origVideoCap_Codec_Channel2",
    "origVideoCap_Bandwidth_Channel2",
    "origVideoCap_Resolution_Channel2",
    "origVideoTransportAddress_IP",
    "origVideoTransportAddress_Port",
    "origVideoTransportAddress_IP_Channel2",
    "origVideoTransportAddress_Port_Channel2",
    "origVideoChannel_Role_Channel2",
    "origRSVPAudioStat",
    "origRSVPVideoStat",
    "origMobileDeviceName",
    "origMobileCallDuration",
    // Destination leg
    "destLegIdentifier",
    "destNodeId",
    "destSpan",
    "destIpAddr",
    "destIpv4v6Addr",
    "destDeviceName",
    "destDeviceType",
    "destDeviceSessionID",
    "destPrecedenceLevel",
    "destDTMFMethod",
    "destConversationId",
    "destCallTerminationOnBehalfOf",
    "destCause_location",
    "destCause_value",
    "destMediaCap_payloadCapability",
    "destMediaCap_maxFramesPerPacket",
    "destMediaCap_g723BitRate",
    "destMediaCap_Bandwidth",
    "destMediaCap_Bandwidth_Channel2",
    "destMediaTransportAddress_IP",
    "destMediaTransportAddress_Port",
    "destMediaTransportAddress_IP_Channel2",
    "destMediaTransportAddress_Port_Channel2",
    "destVideoCap_Codec",
    "destVideoCap_Bandwidth",
    "destVideoCap_Resolution",
    "destVideoCap_Codec_Channel2",
    "destVideoCap_Bandwidth_Channel2",
    "destVideoCap_Resolution_Channel2",
    "destVideoTransportAddress_IP",
    "destVideoTransportAddress_Port",
    "destVideoTransportAddress_IP_Channel2",
    "destVideoTransportAddress_Port_Channel2",
    "destVideoChannel_Role_Channel2",
    "destRSVPAudioStat",
    "destRSVPVideoStat",
    "destMobileDeviceName",
    "destMobileCallDuration",
    // Authorization and billing
    "authorizationCodeValue",
    "authorizationLevel",
    "authCodeDescription",
    "clientMatterCode",
    "comment",
    // Routing
    "callSecuredStatus",
    "calledPartyPatternUsage",
    "currentRoutingReason",
    "joinOnBehalfOf",
    "huntPilotDN",
    "huntPilotPartition",
    "huntPilotPattern",
    // Queueing
    "wasCallQueued",
    "totalWaitTimeInQueue",
    // Mobility
    "mobileCallingPartyNumber",
    "finalMobileCalledPartyNumber",
    "mobileCallType",
    // Trunk protocol legs
    "IncomingProtocolID",
    "IncomingProtocolCallRef",
    "IncomingICID",
    "IncomingOrigIOI",
    "IncomingTermIOI",
    "OutgoingProtocolID",
    "OutgoingProtocolCallRef",
    "OutgoingICID",
    "OutgoingOrigIOI",
    "OutgoingTermIOI",
    // Outpulsed digits
    "outpulsedCallingPartyNumber",
    "outpulsedCalledPartyNumber",
    "outpulsedOriginalCalledPartyNumber",
    "outpulsedLastRedirectingNumber",
];

/// The identifier column every row must carry.
pub const IDENTIFIER_COLUMN: &str = "pkid";

static COLUMN_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| RECOGNIZED_COLUMNS.iter().map(|c| (*c, *c)).collect());

/// Returns the canonical static name for a recognized header.
pub fn recognize(header: &str) -> Option<&'static str> {
    COLUMN_INDEX.get(header.trim()).copied()
}

/// One parsed line: recognized column name to raw text.
///
/// Only recognized columns are kept, so lookups never see producer extras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: BTreeMap<&'static str, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under `column`. Returns `false` and drops the value if
    /// the column is not recognized.
    pub fn insert(&mut self, column: &str, value: impl Into<String>) -> bool {
        match recognize(column) {
            Some(name) => {
                self.fields.insert(name, value.into());
                true
            }
            None => false,
        }
    }

    /// Builds a row from `(column, value)` pairs, ignoring unknown columns.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.insert(k.as_ref(), v);
        }
        row
    }

    /// Trimmed value of `column`, treating blank text as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        debug_assert!(
            recognize(column).is_some(),
            "lookup of unrecognized column {column}"
        );
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Positional mapping from a file's header row to recognized columns.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    slots: Vec<Option<&'static str>>,
}

impl HeaderMap {
    pub fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            slots: headers.into_iter().map(recognize).collect(),
        }
    }

    /// Number of header fields that map to a recognized column.
    pub fn recognized_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn has(&self, column: &str) -> bool {
        self.slots.iter().flatten().any(|c| *c == column)
    }

    /// Zips a record's fields against the header. Extra trailing fields are
    /// dropped, missing trailing fields are simply absent.
    pub fn row<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> RawRow {
        let mut row = RawRow::new();
        for (slot, value) in self.slots.iter().zip(fields) {
            if let Some(column) = slot {
                row.fields.insert(column, value.to_string());
            }
        }
        row
    }
}
