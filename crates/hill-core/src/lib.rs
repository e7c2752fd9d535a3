//! Core domain model for Hill Sync: persisted entities, draft handoff types,
//! and the identity/date helpers shared by every reconciler.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "hill-core";

/// Chamber recorded on every roll-call vote this ingester touches.
pub const CHAMBER_HOUSE: &str = "House";

/// Bill subtypes the congress.gov v3 bill endpoints serve. Anything outside
/// this list is skipped wherever subtype gating applies, never an error.
pub const VALID_BILL_TYPES: [&str; 8] = [
    "HR", "S", "HJRES", "SJRES", "HCONRES", "SCONRES", "HRES", "SRES",
];

pub fn is_valid_bill_type(bill_type: &str) -> bool {
    VALID_BILL_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(bill_type))
}

/// Derive the stable natural key for a bill, e.g. `119HR1234`.
///
/// Endpoints disagree on subtype casing (bill detail reports `HR`, the
/// actions and summaries paths use `hr`), so the subtype is upper-cased here
/// and every caller resolves the same key for the same logical bill.
pub fn derive_name_id(congress: i32, bill_type: &str, number: &str) -> String {
    format!(
        "{congress}{}{}",
        bill_type.trim().to_ascii_uppercase(),
        number.trim()
    )
}

/// Parse the near-ISO-8601 timestamps congress.gov emits.
///
/// Accepts RFC 3339 (including the literal `Z` designator), a naive
/// `YYYY-MM-DDTHH:MM:SS` taken as UTC, and date-only `YYYY-MM-DD`. Empty or
/// malformed input yields `None`; callers store the field as unset rather
/// than failing the batch.
pub fn parse_api_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Some(Utc.from_utc_datetime(&midnight));
    }
    None
}

/// Canonical position a member can record on a roll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VotePosition {
    Yea,
    Nay,
    Present,
    NotVoting,
}

impl VotePosition {
    /// Map a raw cast string onto a position. Exact, case-sensitive matches
    /// only; anything else is an unmapped value the caller must count as a
    /// failure.
    pub fn from_cast(raw: &str) -> Option<Self> {
        match raw {
            "Yea" | "Aye" => Some(Self::Yea),
            "Nay" => Some(Self::Nay),
            "Present" => Some(Self::Present),
            "Not Voting" => Some(Self::NotVoting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yea => "YEA",
            Self::Nay => "NAY",
            Self::Present => "PRESENT",
            Self::NotVoting => "NOT_VOTING",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), used when decoding stored rows.
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "YEA" => Some(Self::Yea),
            "NAY" => Some(Self::Nay),
            "PRESENT" => Some(Self::Present),
            "NOT_VOTING" => Some(Self::NotVoting),
            _ => None,
        }
    }
}

/// Per-position counts for one roll call. Derived state: recomputed from
/// scratch on every member-vote pass and written over whatever was there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTotals {
    pub yea: i32,
    pub nay: i32,
    pub present: i32,
    pub not_voting: i32,
}

impl VoteTotals {
    pub fn record(&mut self, position: VotePosition) {
        match position {
            VotePosition::Yea => self.yea += 1,
            VotePosition::Nay => self.nay += 1,
            VotePosition::Present => self.present += 1,
            VotePosition::NotVoting => self.not_voting += 1,
        }
    }

    /// Combined count across all four positions.
    pub fn voting_total(&self) -> i32 {
        self.yea + self.nay + self.present + self.not_voting
    }
}

/// One bill, keyed by its derived natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislation {
    pub id: Uuid,
    pub name_id: String,
    pub congress: i32,
    pub bill_type: String,
    pub number: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub introduced_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLegislation {
    pub name_id: String,
    pub congress: i32,
    pub bill_type: String,
    pub number: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub introduced_date: Option<DateTime<Utc>>,
}

/// Mutable fields of a Legislation row. The natural key is never touched
/// after creation; an update overwrites these three wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegislationChanges {
    pub title: Option<String>,
    pub url: Option<String>,
    pub introduced_date: Option<DateTime<Utc>>,
}

/// One legislative action on a bill. Insert-only; identity is the full
/// (legislation, date, text, type) tuple rather than a natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillAction {
    pub id: Uuid,
    pub legislation_id: Uuid,
    pub action_date: DateTime<Utc>,
    pub text: String,
    pub action_type: String,
    pub action_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBillAction {
    pub legislation_id: Uuid,
    pub action_date: DateTime<Utc>,
    pub text: String,
    pub action_type: String,
    pub action_code: Option<String>,
}

/// One summary version of a bill, keyed by (legislation, version code).
/// Upstream reuses version codes as the text evolves, so a repeat sighting
/// updates the row in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummary {
    pub id: Uuid,
    pub legislation_id: Uuid,
    pub version_code: String,
    pub text: String,
    pub action_desc: Option<String>,
    pub action_date: Option<DateTime<Utc>>,
    pub update_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBillSummary {
    pub legislation_id: Uuid,
    pub version_code: String,
    pub text: String,
    pub action_desc: Option<String>,
    pub action_date: Option<DateTime<Utc>>,
    pub update_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillSummaryChanges {
    pub text: String,
    pub action_desc: Option<String>,
    pub action_date: Option<DateTime<Utc>>,
    pub update_date: Option<DateTime<Utc>>,
}

/// One roll-call vote event, unique per (congress, chamber, roll call).
/// Identity is independent of the linked-bill fields, which may be absent
/// or change between fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub congress: i32,
    pub chamber: String,
    pub roll_call: i32,
    pub session_number: Option<i32>,
    pub vote_date: DateTime<Utc>,
    pub question: Option<String>,
    pub vote_type: Option<String>,
    pub result: Option<String>,
    pub legislation_number: Option<String>,
    pub legislation_name_id: Option<String>,
    pub yea_total: i32,
    pub nay_total: i32,
    pub present_total: i32,
    pub not_voting_total: i32,
    pub voting_total: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVote {
    pub congress: i32,
    pub chamber: String,
    pub roll_call: i32,
    pub session_number: Option<i32>,
    pub vote_date: DateTime<Utc>,
    pub question: Option<String>,
    pub vote_type: Option<String>,
    pub result: Option<String>,
    pub legislation_number: Option<String>,
    pub legislation_name_id: Option<String>,
}

/// Mutable header fields of a Vote row. Totals are deliberately absent:
/// they are only ever written through a totals overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteChanges {
    pub session_number: Option<i32>,
    pub vote_date: DateTime<Utc>,
    pub question: Option<String>,
    pub vote_type: Option<String>,
    pub result: Option<String>,
    pub legislation_number: Option<String>,
    pub legislation_name_id: Option<String>,
}

/// One member's cast vote within a roll call. Unique per (vote, member),
/// immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberVote {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub member_id: Uuid,
    pub position: VotePosition,
    pub party: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemberVote {
    pub vote_id: Uuid,
    pub member_id: Uuid,
    pub position: VotePosition,
    pub party: Option<String>,
    pub state: Option<String>,
}

/// Reference entity owned by a separate ingester; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub bioguide_id: String,
    pub name: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
}

/// Parsed/pre-normalized handoff contract from adapters into the sync
/// engine. Everything is optional; the reconcilers decide what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillDraft {
    pub congress: Option<i32>,
    pub bill_type: Option<String>,
    pub number: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub introduced_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillActionDraft {
    pub action_date: Option<String>,
    pub text: Option<String>,
    pub action_type: Option<String>,
    pub action_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryDraft {
    pub version_code: Option<String>,
    pub text: Option<String>,
    pub action_desc: Option<String>,
    pub action_date: Option<String>,
    pub update_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteDraft {
    pub congress: Option<i32>,
    pub session_number: Option<i32>,
    pub roll_call: Option<i32>,
    pub start_date: Option<String>,
    pub question: Option<String>,
    pub vote_type: Option<String>,
    pub result: Option<String>,
    pub legislation_type: Option<String>,
    pub legislation_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberVoteDraft {
    pub bioguide_id: Option<String>,
    pub vote_cast: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_id_concatenates_the_three_parts() {
        assert_eq!(derive_name_id(119, "HR", "1234"), "119HR1234");
        assert_eq!(derive_name_id(118, "SJRES", "7"), "118SJRES7");
    }

    #[test]
    fn name_id_is_stable_across_endpoint_casing() {
        assert_eq!(
            derive_name_id(119, "hr", "1234"),
            derive_name_id(119, "HR", "1234")
        );
        assert_eq!(derive_name_id(119, "hconres", "12"), "119HCONRES12");
    }

    #[test]
    fn bill_type_gate_ignores_case_but_not_unknown_codes() {
        assert!(is_valid_bill_type("HR"));
        assert!(is_valid_bill_type("hr"));
        assert!(is_valid_bill_type("sjres"));
        assert!(!is_valid_bill_type("TREATY"));
        assert!(!is_valid_bill_type(""));
    }

    #[test]
    fn timestamps_parse_across_upstream_variants() {
        let z = parse_api_timestamp("2025-06-10T15:52:21Z").expect("zulu");
        assert_eq!(z.to_rfc3339(), "2025-06-10T15:52:21+00:00");

        let offset = parse_api_timestamp("2025-01-16T19:05:00-05:00").expect("offset");
        assert_eq!(offset.to_rfc3339(), "2025-01-17T00:05:00+00:00");

        let naive = parse_api_timestamp("2025-01-16T19:05:00").expect("naive");
        assert_eq!(naive.to_rfc3339(), "2025-01-16T19:05:00+00:00");

        let date_only = parse_api_timestamp("2025-01-03").expect("date only");
        assert_eq!(date_only.to_rfc3339(), "2025-01-03T00:00:00+00:00");
    }

    #[test]
    fn malformed_timestamps_become_none() {
        assert_eq!(parse_api_timestamp(""), None);
        assert_eq!(parse_api_timestamp("   "), None);
        assert_eq!(parse_api_timestamp("yesterday"), None);
        assert_eq!(parse_api_timestamp("2025-13-40"), None);
    }

    #[test]
    fn cast_values_map_exactly() {
        assert_eq!(VotePosition::from_cast("Yea"), Some(VotePosition::Yea));
        assert_eq!(VotePosition::from_cast("Aye"), Some(VotePosition::Yea));
        assert_eq!(VotePosition::from_cast("Nay"), Some(VotePosition::Nay));
        assert_eq!(
            VotePosition::from_cast("Present"),
            Some(VotePosition::Present)
        );
        assert_eq!(
            VotePosition::from_cast("Not Voting"),
            Some(VotePosition::NotVoting)
        );
    }

    #[test]
    fn unrecognized_or_miscased_casts_do_not_map() {
        assert_eq!(VotePosition::from_cast("Abstain"), None);
        assert_eq!(VotePosition::from_cast("yea"), None);
        assert_eq!(VotePosition::from_cast("AYE"), None);
        assert_eq!(VotePosition::from_cast("not voting"), None);
    }

    #[test]
    fn stored_positions_round_trip() {
        for position in [
            VotePosition::Yea,
            VotePosition::Nay,
            VotePosition::Present,
            VotePosition::NotVoting,
        ] {
            assert_eq!(VotePosition::from_stored(position.as_str()), Some(position));
        }
        assert_eq!(VotePosition::from_stored("ABSTAIN"), None);
    }

    #[test]
    fn totals_tally_each_position_and_combine() {
        let mut totals = VoteTotals::default();
        totals.record(VotePosition::Yea);
        totals.record(VotePosition::Yea);
        totals.record(VotePosition::Nay);
        totals.record(VotePosition::Present);
        totals.record(VotePosition::NotVoting);
        assert_eq!(totals.yea, 2);
        assert_eq!(totals.nay, 1);
        assert_eq!(totals.present, 1);
        assert_eq!(totals.not_voting, 1);
        assert_eq!(totals.voting_total(), 5);
    }
}
