//! RM `EVENT_CONTEXT`: the clinical session a composition was recorded in.

use chrono::{DateTime, Utc};
use ehr_types::NonEmptyText;
use serde::{Deserialize, Serialize};

use crate::data_types::{DvCodedText, DvText};
use crate::{OpenEhrError, ValidityError};

/// RM `PARTY_IDENTIFIED` (reduced to a name and an optional local identifier).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartyIdentified {
    pub name: NonEmptyText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<NonEmptyText>,
}

/// RM `PARTICIPATION`: someone who took part in the session, and in what role.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Participation {
    pub function: DvText,
    pub performer: PartyIdentified,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DvCodedText>,
}

/// Time, place and participants of the recording event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    location: Option<NonEmptyText>,
    setting: DvCodedText,
    health_care_facility: Option<PartyIdentified>,
    participations: Option<Vec<Participation>>,
}

impl EventContext {
    /// # Errors
    ///
    /// Returns a [`ValidityError`] if `end_time` precedes `start_time`
    /// ([`ValidityError::EndBeforeStart`]) or `participations` is present but empty
    /// ([`ValidityError::EmptyParticipations`]).
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        location: Option<NonEmptyText>,
        setting: DvCodedText,
        health_care_facility: Option<PartyIdentified>,
        participations: Option<Vec<Participation>>,
    ) -> Result<Self, OpenEhrError> {
        if end_time.is_some_and(|end| end < start_time) {
            return Err(ValidityError::EndBeforeStart.into());
        }
        if participations.as_ref().is_some_and(Vec::is_empty) {
            return Err(ValidityError::EmptyParticipations.into());
        }

        Ok(Self {
            start_time,
            end_time,
            location,
            setting,
            health_care_facility,
            participations,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_ref().map(NonEmptyText::as_str)
    }

    pub fn setting(&self) -> &DvCodedText {
        &self.setting
    }

    pub fn health_care_facility(&self) -> Option<&PartyIdentified> {
        self.health_care_facility.as_ref()
    }

    pub fn participations(&self) -> Option<&[Participation]> {
        self.participations.as_deref()
    }
}
