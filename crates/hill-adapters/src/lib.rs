//! Typed payload shapes for the congress.gov v3 API and extraction into the
//! draft records the sync engine consumes.
//!
//! Everything upstream is optional here; the reconcilers decide which fields
//! a record must carry. Unknown payload fields are ignored.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use hill_core::{
    BillActionDraft, BillDraft, BillSummaryDraft, MemberVoteDraft, VoteDraft,
};

pub const CRATE_NAME: &str = "hill-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("payload did not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BillListPayload {
    bills: Vec<BillRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BillDetailPayload {
    bill: Option<BillRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BillRecord {
    congress: Option<i32>,
    #[serde(rename = "type")]
    bill_type: Option<String>,
    number: Option<String>,
    title: Option<String>,
    url: Option<String>,
    introduced_date: Option<String>,
}

impl From<BillRecord> for BillDraft {
    fn from(record: BillRecord) -> Self {
        Self {
            congress: record.congress,
            bill_type: record.bill_type,
            number: record.number,
            title: record.title,
            url: record.url,
            introduced_date: record.introduced_date,
        }
    }
}

/// Bill stubs from the list endpoint. A missing `bills` array is an empty
/// batch, not an error.
pub fn parse_bill_list(payload: &JsonValue) -> Result<Vec<BillDraft>, AdapterError> {
    let parsed: BillListPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed.bills.into_iter().map(BillDraft::from).collect())
}

/// The single bill object from the detail endpoint, or `None` when the
/// response carried no bill data.
pub fn parse_bill_detail(payload: &JsonValue) -> Result<Option<BillDraft>, AdapterError> {
    let parsed: BillDetailPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed.bill.map(BillDraft::from))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ActionsPayload {
    actions: Vec<ActionRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ActionRecord {
    action_date: Option<String>,
    text: Option<String>,
    #[serde(rename = "type")]
    action_type: Option<String>,
    action_code: Option<String>,
}

pub fn parse_actions(payload: &JsonValue) -> Result<Vec<BillActionDraft>, AdapterError> {
    let parsed: ActionsPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed
        .actions
        .into_iter()
        .map(|a| BillActionDraft {
            action_date: a.action_date,
            text: a.text,
            action_type: a.action_type,
            action_code: a.action_code,
        })
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SummariesPayload {
    summaries: Vec<SummaryRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SummaryRecord {
    version_code: Option<String>,
    text: Option<String>,
    action_desc: Option<String>,
    action_date: Option<String>,
    update_date: Option<String>,
}

pub fn parse_summaries(payload: &JsonValue) -> Result<Vec<BillSummaryDraft>, AdapterError> {
    let parsed: SummariesPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed
        .summaries
        .into_iter()
        .map(|s| BillSummaryDraft {
            version_code: s.version_code,
            text: s.text,
            action_desc: s.action_desc,
            action_date: s.action_date,
            update_date: s.update_date,
        })
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HouseVotesPayload {
    house_roll_call_votes: Vec<VoteRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VoteRecord {
    congress: Option<i32>,
    session_number: Option<i32>,
    roll_call_number: Option<i32>,
    start_date: Option<String>,
    vote_question: Option<String>,
    vote_type: Option<String>,
    result: Option<String>,
    legislation_type: Option<String>,
    legislation_number: Option<String>,
}

impl From<VoteRecord> for VoteDraft {
    fn from(record: VoteRecord) -> Self {
        Self {
            congress: record.congress,
            session_number: record.session_number,
            roll_call: record.roll_call_number,
            start_date: record.start_date,
            question: record.vote_question,
            vote_type: record.vote_type,
            result: record.result,
            legislation_type: record.legislation_type,
            legislation_number: record.legislation_number,
        }
    }
}

/// Roll-call headers from the house vote list endpoint.
pub fn parse_house_votes(payload: &JsonValue) -> Result<Vec<VoteDraft>, AdapterError> {
    let parsed: HouseVotesPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed
        .house_roll_call_votes
        .into_iter()
        .map(VoteDraft::from)
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MemberVotesPayload {
    house_roll_call_vote_member_votes: Option<MemberVotesEnvelope>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct MemberVotesEnvelope {
    results: Vec<MemberVoteRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MemberVoteRecord {
    #[serde(rename = "bioguideID")]
    bioguide_id: Option<String>,
    vote_cast: Option<String>,
    vote_party: Option<String>,
    vote_state: Option<String>,
}

/// The nested per-member results of one roll call. An absent envelope is an
/// empty batch.
pub fn parse_member_votes(payload: &JsonValue) -> Result<Vec<MemberVoteDraft>, AdapterError> {
    let parsed: MemberVotesPayload = serde_json::from_value(payload.clone())?;
    Ok(parsed
        .house_roll_call_vote_member_votes
        .map(|envelope| envelope.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| MemberVoteDraft {
            bioguide_id: r.bioguide_id,
            vote_cast: r.vote_cast,
            party: r.vote_party,
            state: r.vote_state,
        })
        .collect())
}
