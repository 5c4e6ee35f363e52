//! Canonical call record and its value groups.
//!
//! Every group is a plain value struct whose leaves are either a typed value
//! or `None`. A group with no present leaf is itself `None` on the record, so a
//! sparse row produces a sparse document.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::directory::UserDirectory;

/// Direction of a call relative to the known internal numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallDirection {
    /// Calling party is not an internal number.
    Incoming,
    /// Calling party is internal, original called party is not.
    Outgoing,
    /// Both parties are internal.
    Internal,
}

impl CallDirection {
    /// Classifies a call from its calling and original-called numbers.
    ///
    /// A missing number is never internal, so a call without a calling
    /// number is incoming and an internal caller without a called number is
    /// outgoing. Only a row carrying neither number stays unclassified.
    pub fn classify(
        calling: Option<&str>,
        original_called: Option<&str>,
        directory: &UserDirectory,
    ) -> Option<Self> {
        if calling.is_none() && original_called.is_none() {
            return None;
        }
        let is_internal = |number: Option<&str>| number.is_some_and(|n| directory.contains(n));
        Some(match (is_internal(calling), is_internal(original_called)) {
            (false, _) => Self::Incoming,
            (true, true) => Self::Internal,
            (true, false) => Self::Outgoing,
        })
    }

    /// Stable label used in storage columns and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "INCOMING",
            Self::Outgoing => "OUTGOING",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call, as persisted to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Producer-assigned unique row identifier. The only required field.
    pub pk_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdr_record_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_call: Option<GlobalCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<CallTimes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_direction: Option<CallDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calling_party: Option<CallingParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_called_party: Option<OriginalCalledParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_called_party: Option<FinalCalledParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_redirect: Option<LastRedirect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_redirecting: Option<LastRedirecting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_code_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_matter_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_secured_status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_party_pattern_usage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_routing_reason: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_on_behalf_of: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunt_pilot: Option<HuntPilot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<Queueing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<MobileCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming: Option<ProtocolLeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<ProtocolLeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outpulsed: Option<Outpulsed>,
}

impl CallRecord {
    /// A record carrying only its identifier.
    pub fn bare(pk_id: impl Into<String>) -> Self {
        Self {
            pk_id: pk_id.into(),
            cdr_record_type: None,
            global_call: None,
            date_time: None,
            duration: None,
            call_direction: None,
            calling_party: None,
            original_called_party: None,
            final_called_party: None,
            last_redirect: None,
            last_redirecting: None,
            origin: None,
            destination: None,
            authorization: None,
            auth_code_description: None,
            client_matter_code: None,
            comment: None,
            call_secured_status: None,
            called_party_pattern_usage: None,
            current_routing_reason: None,
            join_on_behalf_of: None,
            hunt_pilot: None,
            queue: None,
            mobile: None,
            incoming: None,
            outgoing: None,
            outpulsed: None,
        }
    }

    /// Calling party number, if present.
    pub fn calling_number(&self) -> Option<&str> {
        self.calling_party.as_ref()?.number.as_deref()
    }

    /// Origination instant, if present.
    pub fn originated_at(&self) -> Option<DateTime<Utc>> {
        self.date_time.as_ref()?.origination
    }
}

/// Collapses a group to `None` when none of its leaves are present.
pub(crate) fn present<T: Default + PartialEq>(group: T) -> Option<T> {
    if group == T::default() {
        None
    } else {
        Some(group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCall {
    pub call_manager_id: Option<i64>,
    pub call_id: Option<i64>,
    pub cluster_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTimes {
    pub origination: Option<DateTime<Utc>>,
    pub connect: Option<DateTime<Utc>>,
    pub disconnect: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingParty {
    pub number: Option<String>,
    pub partition: Option<String>,
    pub uri: Option<String>,
    pub unicode_login_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalCalledParty {
    pub number: Option<String>,
    pub partition: Option<String>,
    pub uri: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalCalledParty {
    pub number: Option<String>,
    pub partition: Option<String>,
    pub uri: Option<String>,
    pub pattern: Option<String>,
    pub unicode_login_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRedirect {
    pub dn: Option<String>,
    pub partition: Option<String>,
    pub uri: Option<String>,
    pub on_behalf_of: Option<i64>,
    pub reason: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRedirecting {
    pub party_pattern: Option<String>,
    pub routing_reason: Option<i64>,
}

/// Release cause reported by one side of the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cause {
    pub location: Option<i64>,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCapability {
    pub payload_capability: Option<i64>,
    pub max_frames_per_packet: Option<i64>,
    pub g723_bit_rate: Option<i64>,
    pub bandwidth: Option<i64>,
    pub bandwidth_channel2: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCapability {
    pub codec: Option<i64>,
    pub bandwidth: Option<i64>,
    pub resolution: Option<i64>,
    pub codec_channel2: Option<i64>,
    pub bandwidth_channel2: Option<i64>,
    pub resolution_channel2: Option<i64>,
}

/// RTP endpoint of a media stream, with its optional second channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportAddress {
    pub ip: Option<Ipv4Addr>,
    pub port: Option<i64>,
    pub ip_channel2: Option<Ipv4Addr>,
    pub port_channel2: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub audio_stat: Option<String>,
    pub video_stat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileLeg {
    pub device_name: Option<String>,
    pub call_duration: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalledPartyRedirect {
    pub on_behalf_of: Option<i64>,
    pub reason: Option<i64>,
}

/// Originating side of the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    pub leg_call_identifier: Option<i64>,
    pub node_id: Option<i64>,
    pub span: Option<i64>,
    pub ip_addr: Option<Ipv4Addr>,
    pub ipv4v6_addr: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub device_session_id: Option<String>,
    pub precedence_level: Option<i64>,
    pub dtmf_method: Option<i64>,
    pub conversation_id: Option<i64>,
    pub call_termination_on_behalf_of: Option<i64>,
    pub routing_reason: Option<i64>,
    pub video_channel_role_channel2: Option<i64>,
    pub called_party_redirect: Option<CalledPartyRedirect>,
    pub cause: Option<Cause>,
    pub media_cap: Option<MediaCapability>,
    pub media_transport_address: Option<TransportAddress>,
    pub video_cap: Option<VideoCapability>,
    pub video_transport_address: Option<TransportAddress>,
    pub rsvp: Option<Rsvp>,
    pub mobile: Option<MobileLeg>,
}

/// Terminating side of the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub leg_identifier: Option<i64>,
    pub node_id: Option<i64>,
    pub span: Option<i64>,
    pub ip_addr: Option<Ipv4Addr>,
    pub ipv4v6_addr: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub device_session_id: Option<String>,
    pub precedence_level: Option<i64>,
    pub dtmf_method: Option<i64>,
    pub conversation_id: Option<i64>,
    pub call_termination_on_behalf_of: Option<i64>,
    pub video_channel_role_channel2: Option<i64>,
    pub cause: Option<Cause>,
    pub media_cap: Option<MediaCapability>,
    pub media_transport_address: Option<TransportAddress>,
    pub video_cap: Option<VideoCapability>,
    pub video_transport_address: Option<TransportAddress>,
    pub rsvp: Option<Rsvp>,
    pub mobile: Option<MobileLeg>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub code_value: Option<String>,
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuntPilot {
    pub dn: Option<String>,
    pub partition: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queueing {
    pub was_call_queued: Option<bool>,
    pub total_wait_time_in_queue: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileCall {
    pub calling_party_number: Option<String>,
    pub final_called_party_number: Option<String>,
    pub call_type: Option<i64>,
}

/// SIP/H.323 protocol identifiers for one trunk leg.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolLeg {
    pub protocol_id: Option<i64>,
    pub protocol_call_ref: Option<String>,
    pub icid: Option<String>,
    pub orig_ioi: Option<String>,
    pub term_ioi: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpulsed {
    pub calling_party_number: Option<String>,
    pub called_party_number: Option<String>,
    pub original_called_party_number: Option<String>,
    pub last_redirecting_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::from_numbers(["1001", "1002"])
    }

    #[test]
    fn test_direction_truth_table() {
        let dir = directory();
        assert_eq!(
            CallDirection::classify(Some("1001"), Some("1002"), &dir),
            Some(CallDirection::Internal)
        );
        assert_eq!(
            CallDirection::classify(Some("905551112233"), Some("1002"), &dir),
            Some(CallDirection::Incoming)
        );
        assert_eq!(
            CallDirection::classify(Some("1001"), Some("905551112233"), &dir),
            Some(CallDirection::Outgoing)
        );
    }

    #[test]
    fn test_direction_external_to_external_is_incoming() {
        let dir = directory();
        assert_eq!(
            CallDirection::classify(Some("905551112233"), Some("905559998877"), &dir),
            Some(CallDirection::Incoming)
        );
    }

    #[test]
    fn test_direction_missing_numbers_count_as_external() {
        let dir = directory();
        assert_eq!(
            CallDirection::classify(None, Some("1002"), &dir),
            Some(CallDirection::Incoming)
        );
        assert_eq!(
            CallDirection::classify(Some("1001"), None, &dir),
            Some(CallDirection::Outgoing)
        );
        assert_eq!(CallDirection::classify(None, None, &dir), None);
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        let json = serde_json::to_string(&CallDirection::Outgoing).unwrap();
        assert_eq!(json, "\"OUTGOING\"");
        assert_eq!(CallDirection::Internal.to_string(), "INTERNAL");
    }

    #[test]
    fn test_bare_record_serializes_only_identifier() {
        let record = CallRecord::bare("abc-123");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, serde_json::json!({ "pkId": "abc-123" }));
    }

    #[test]
    fn test_present_collapses_empty_group() {
        assert_eq!(present(Cause::default()), None);
        let cause = Cause {
            location: Some(0),
            value: None,
        };
        assert_eq!(present(cause.clone()), Some(cause));
    }

    #[test]
    fn test_address_serializes_as_dotted_quad() {
        let addr = TransportAddress {
            ip: Some(Ipv4Addr::new(10, 1, 2, 3)),
            port: Some(16384),
            ..Default::default()
        };
        let value = serde_json::to_value(&addr).unwrap();
        assert_eq!(value["ip"], "10.1.2.3");
        assert_eq!(value["port"], 16384);
    }
}
