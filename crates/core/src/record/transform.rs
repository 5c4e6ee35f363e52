//! Row to record transformation.

use std::sync::Arc;

use thiserror::Error;

use super::coerce::{FieldReader, FieldWarning};
use super::columns::{RawRow, IDENTIFIER_COLUMN};
use super::directory::UserDirectory;
use super::types::*;

/// Errors that make a row unusable as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("row has no pkid value")]
    MissingIdentifier,
}

/// A record plus whatever field warnings its row produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub record: CallRecord,
    pub warnings: Vec<FieldWarning>,
}

/// Converts raw rows into [`CallRecord`]s.
///
/// Holds the user directory snapshot used for direction classification and
/// nothing else; `transform` does no I/O.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    directory: Arc<UserDirectory>,
}

impl RecordTransformer {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    /// True for the column-type line some exporters write under the header.
    pub fn is_type_descriptor(row: &RawRow) -> bool {
        row.get("cdrRecordType")
            .is_some_and(|v| v.eq_ignore_ascii_case("INTEGER"))
    }

    pub fn transform(&self, row: &RawRow) -> Result<Transformed, TransformError> {
        let pk_id = row
            .get(IDENTIFIER_COLUMN)
            .ok_or(TransformError::MissingIdentifier)?
            .to_string();

        let mut f = FieldReader::new(row);

        let calling_party = present(CallingParty {
            number: f.text("callingPartyNumber"),
            partition: f.text("callingPartyNumberPartition"),
            uri: f.text("callingPartyNumber_uri"),
            unicode_login_user_id: f.text("callingPartyUnicodeLoginUserID"),
        });
        let original_called_party = present(OriginalCalledParty {
            number: f.text("originalCalledPartyNumber"),
            partition: f.text("originalCalledPartyNumberPartition"),
            uri: f.text("originalCalledPartyNumber_uri"),
            pattern: f.text("originalCalledPartyPattern"),
        });

        let call_direction = CallDirection::classify(
            calling_party.as_ref().and_then(|p| p.number.as_deref()),
            original_called_party
                .as_ref()
                .and_then(|p| p.number.as_deref()),
            &self.directory,
        );

        let record = CallRecord {
            pk_id,
            cdr_record_type: f.int("cdrRecordType"),
            global_call: present(GlobalCall {
                call_manager_id: f.int("globalCallID_callManagerId"),
                call_id: f.int("globalCallID_callId"),
                cluster_id: f.text("globalCallId_ClusterID"),
            }),
            date_time: present(CallTimes {
                origination: f.instant("dateTimeOrigination"),
                connect: f.instant("dateTimeConnect"),
                disconnect: f.instant("dateTimeDisconnect"),
            }),
            duration: f.int("duration"),
            call_direction,
            calling_party,
            original_called_party,
            final_called_party: present(FinalCalledParty {
                number: f.text("finalCalledPartyNumber"),
                partition: f.text("finalCalledPartyNumberPartition"),
                uri: f.text("finalCalledPartyNumber_uri"),
                pattern: f.text("finalCalledPartyPattern"),
                unicode_login_user_id: f.text("finalCalledPartyUnicodeLoginUserID"),
            }),
            last_redirect: present(LastRedirect {
                dn: f.text("lastRedirectDn"),
                partition: f.text("lastRedirectDnPartition"),
                uri: f.text("lastRedirectDn_uri"),
                on_behalf_of: f.int("lastRedirectRedirectOnBehalfOf"),
                reason: f.int("lastRedirectRedirectReason"),
            }),
            last_redirecting: present(LastRedirecting {
                party_pattern: f.text("lastRedirectingPartyPattern"),
                routing_reason: f.int("lastRedirectingRoutingReason"),
            }),
            origin: present(origin(&mut f)),
            destination: present(destination(&mut f)),
            authorization: present(Authorization {
                code_value: f.text("authorizationCodeValue"),
                level: f.int("authorizationLevel"),
            }),
            auth_code_description: f.text("authCodeDescription"),
            client_matter_code: f.text("clientMatterCode"),
            comment: f.text("comment"),
            call_secured_status: f.int("callSecuredStatus"),
            called_party_pattern_usage: f.int("calledPartyPatternUsage"),
            current_routing_reason: f.int("currentRoutingReason"),
            join_on_behalf_of: f.int("joinOnBehalfOf"),
            hunt_pilot: present(HuntPilot {
                dn: f.text("huntPilotDN"),
                partition: f.text("huntPilotPartition"),
                pattern: f.text("huntPilotPattern"),
            }),
            queue: present(Queueing {
                was_call_queued: f.flag("wasCallQueued"),
                total_wait_time_in_queue: f.int("totalWaitTimeInQueue"),
            }),
            mobile: present(MobileCall {
                calling_party_number: f.text("mobileCallingPartyNumber"),
                final_called_party_number: f.text("finalMobileCalledPartyNumber"),
                call_type: f.int("mobileCallType"),
            }),
            incoming: present(ProtocolLeg {
                protocol_id: f.int("IncomingProtocolID"),
                protocol_call_ref: f.text("IncomingProtocolCallRef"),
                icid: f.text("IncomingICID"),
                orig_ioi: f.text("IncomingOrigIOI"),
                term_ioi: f.text("IncomingTermIOI"),
            }),
            outgoing: present(ProtocolLeg {
                protocol_id: f.int("OutgoingProtocolID"),
                protocol_call_ref: f.text("OutgoingProtocolCallRef"),
                icid: f.text("OutgoingICID"),
                orig_ioi: f.text("OutgoingOrigIOI"),
                term_ioi: f.text("OutgoingTermIOI"),
            }),
            outpulsed: present(Outpulsed {
                calling_party_number: f.text("outpulsedCallingPartyNumber"),
                called_party_number: f.text("outpulsedCalledPartyNumber"),
                original_called_party_number: f.text("outpulsedOriginalCalledPartyNumber"),
                last_redirecting_number: f.text("outpulsedLastRedirectingNumber"),
            }),
        };

        Ok(Transformed {
            record,
            warnings: f.into_warnings(),
        })
    }
}

fn origin(f: &mut FieldReader<'_>) -> Origin {
    Origin {
        leg_call_identifier: f.int("origLegCallIdentifier"),
        node_id: f.int("origNodeId"),
        span: f.int("origSpan"),
        ip_addr: f.address("origIpAddr"),
        ipv4v6_addr: f.text("origIpv4v6Addr"),
        device_name: f.text("origDeviceName"),
        device_type: f.text("origDeviceType"),
        device_session_id: f.text("origDeviceSessionID"),
        precedence_level: f.int("origPrecedenceLevel"),
        dtmf_method: f.int("origDTMFMethod"),
        conversation_id: f.int("origConversationId"),
        call_termination_on_behalf_of: f.int("origCallTerminationOnBehalfOf"),
        routing_reason: f.int("origRoutingReason"),
        video_channel_role_channel2: f.int("origVideoChannel_Role_Channel2"),
        called_party_redirect: present(CalledPartyRedirect {
            on_behalf_of: f.int("origCalledPartyRedirectOnBehalfOf"),
            reason: f.int("origCalledPartyRedirectReason"),
        }),
        cause: present(Cause {
            location: f.int("origCause_location"),
            value: f.int("origCause_value"),
        }),
        media_cap: present(MediaCapability {
            payload_capability: f.int("origMediaCap_payloadCapability"),
            max_frames_per_packet: f.int("origMediaCap_maxFramesPerPacket"),
            g723_bit_rate: f.int("origMediaCap_g723BitRate"),
            bandwidth: f.int("origMediaCap_Bandwidth"),
            bandwidth_channel2: f.int("origMediaCap_Bandwidth_Channel2"),
        }),
        media_transport_address: present(TransportAddress {
            ip: f.address("origMediaTransportAddress_IP"),
            port: f.int("origMediaTransportAddress_Port"),
            ip_channel2: f.address("origMediaTransportAddress_IP_Channel2"),
            port_channel2: f.int("origMediaTransportAddress_Port_Channel2"),
        }),
        video_cap: present(VideoCapability {
            codec: f.int("origVideoCap_Codec"),
            bandwidth: f.int("origVideoCap_Bandwidth"),
            resolution: f.int("origVideoCap_Resolution"),
            codec_channel2: f.int("origVideoCap_Codec_Channel2"),
            bandwidth_channel2: f.int("origVideoCap_Bandwidth_Channel2"),
            resolution_channel2: f.int("origVideoCap_Resolution_Channel2"),
        }),
        video_transport_address: present(TransportAddress {
            ip: f.address("origVideoTransportAddress_IP"),
            port: f.int("origVideoTransportAddress_Port"),
            ip_channel2: f.address("origVideoTransportAddress_IP_Channel2"),
            port_channel2: f.int("origVideoTransportAddress_Port_Channel2"),
        }),
        rsvp: present(Rsvp {
            audio_stat: f.text("origRSVPAudioStat"),
            video_stat: f.text("origRSVPVideoStat"),
        }),
        mobile: present(MobileLeg {
            device_name: f.text("origMobileDeviceName"),
            call_duration: f.int("origMobileCallDuration"),
        }),
    }
}

fn destination(f: &mut FieldReader<'_>) -> Destination {
    Destination {
        leg_identifier: f.int("destLegIdentifier"),
        node_id: f.int("destNodeId"),
        span: f.int("destSpan"),
        ip_addr: f.address("destIpAddr"),
        ipv4v6_addr: f.text("destIpv4v6Addr"),
        device_name: f.text("destDeviceName"),
        device_type: f.text("destDeviceType"),
        device_session_id: f.text("destDeviceSessionID"),
        precedence_level: f.int("destPrecedenceLevel"),
        dtmf_method: f.int("destDTMFMethod"),
        conversation_id: f.int("destConversationId"),
        call_termination_on_behalf_of: f.int("destCallTerminationOnBehalfOf"),
        video_channel_role_channel2: f.int("destVideoChannel_Role_Channel2"),
        cause: present(Cause {
            location: f.int("destCause_location"),
            value: f.int("destCause_value"),
        }),
        media_cap: present(MediaCapability {
            payload_capability: f.int("destMediaCap_payloadCapability"),
            max_frames_per_packet: f.int("destMediaCap_maxFramesPerPacket"),
            g723_bit_rate: f.int("destMediaCap_g723BitRate"),
            bandwidth: f.int("destMediaCap_Bandwidth"),
            bandwidth_channel2: f.int("destMediaCap_Bandwidth_Channel2"),
        }),
        media_transport_address: present(TransportAddress {
            ip: f.address("destMediaTransportAddress_IP"),
            port: f.int("destMediaTransportAddress_Port"),
            ip_channel2: f.address("destMediaTransportAddress_IP_Channel2"),
            port_channel2: f.int("destMediaTransportAddress_Port_Channel2"),
        }),
        video_cap: present(VideoCapability {
            codec: f.int("destVideoCap_Codec"),
            bandwidth: f.int("destVideoCap_Bandwidth"),
            resolution: f.int("destVideoCap_Resolution"),
            codec_channel2: f.int("destVideoCap_Codec_Channel2"),
            bandwidth_channel2: f.int("destVideoCap_Bandwidth_Channel2"),
            resolution_channel2: f.int("destVideoCap_Resolution_Channel2"),
        }),
        video_transport_address: present(TransportAddress {
            ip: f.address("destVideoTransportAddress_IP"),
            port: f.int("destVideoTransportAddress_Port"),
            ip_channel2: f.address("destVideoTransportAddress_IP_Channel2"),
            port_channel2: f.int("destVideoTransportAddress_Port_Channel2"),
        }),
        rsvp: present(Rsvp {
            audio_stat: f.text("destRSVPAudioStat"),
            video_stat: f.text("destRSVPVideoStat"),
        }),
        mobile: present(MobileLeg {
            device_name: f.text("destMobileDeviceName"),
            call_duration: f.int("destMobileCallDuration"),
        }),
    }
}
