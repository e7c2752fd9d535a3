//! Persisted-store and upstream-fetch collaborators for Hill Sync.
//!
//! The [`Store`] trait is the seam the reconcilers work against: composite-key
//! lookups plus create/update/create-many per entity. [`PgStore`] is the
//! Postgres backend; [`MemStore`] is an in-memory double for tests and dry
//! runs. [`CongressClient`] wraps the congress.gov v3 API with retry
//! classification and capped exponential backoff.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use thiserror::Error;
use tracing::info_span;
use uuid::Uuid;

use hill_core::{
    BillAction, BillSummary, BillSummaryChanges, Legislation, LegislationChanges, Member,
    MemberVote, NewBillAction, NewBillSummary, NewLegislation, NewMemberVote, NewVote, Vote,
    VoteChanges, VoteTotals,
};

pub const CRATE_NAME: &str = "hill-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {entity} row with id {id} to update")]
    MissingRow { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Logical read/write operations the reconcilers need, one method per
/// documented composite-key lookup. Upsert is find-then-create-or-update at
/// the call site; nothing here is assumed atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn legislation_by_name_id(
        &self,
        name_id: &str,
    ) -> Result<Option<Legislation>, StoreError>;
    async fn create_legislation(&self, rec: NewLegislation) -> Result<Legislation, StoreError>;
    async fn update_legislation(
        &self,
        id: Uuid,
        changes: LegislationChanges,
    ) -> Result<Legislation, StoreError>;

    /// Existence check on the full (legislation, date, text, type) tuple.
    async fn action_exists(
        &self,
        legislation_id: Uuid,
        action_date: DateTime<Utc>,
        text: &str,
        action_type: &str,
    ) -> Result<bool, StoreError>;
    async fn create_action(&self, rec: NewBillAction) -> Result<BillAction, StoreError>;

    async fn summary_by_version(
        &self,
        legislation_id: Uuid,
        version_code: &str,
    ) -> Result<Option<BillSummary>, StoreError>;
    async fn create_summary(&self, rec: NewBillSummary) -> Result<BillSummary, StoreError>;
    async fn update_summary(
        &self,
        id: Uuid,
        changes: BillSummaryChanges,
    ) -> Result<BillSummary, StoreError>;

    async fn vote_by_roll_call(
        &self,
        congress: i32,
        chamber: &str,
        roll_call: i32,
    ) -> Result<Option<Vote>, StoreError>;
    async fn create_vote(&self, rec: NewVote) -> Result<Vote, StoreError>;
    /// Updates header fields only; totals are written exclusively through
    /// [`set_vote_totals`](Self::set_vote_totals).
    async fn update_vote(&self, id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError>;
    async fn set_vote_totals(&self, id: Uuid, totals: VoteTotals) -> Result<(), StoreError>;

    async fn member_ids_with_votes(&self, vote_id: Uuid) -> Result<HashSet<Uuid>, StoreError>;
    async fn create_member_votes(&self, rows: Vec<NewMemberVote>) -> Result<usize, StoreError>;

    /// Full read of the member reference table, consumed once per run by the
    /// member cache.
    async fn all_members(&self) -> Result<Vec<Member>, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS members (
  id UUID PRIMARY KEY,
  bioguide_id TEXT NOT NULL UNIQUE,
  name TEXT,
  party TEXT,
  state TEXT
);

CREATE TABLE IF NOT EXISTS legislation (
  id UUID PRIMARY KEY,
  name_id TEXT NOT NULL UNIQUE,
  congress INTEGER NOT NULL,
  bill_type TEXT NOT NULL,
  number TEXT NOT NULL,
  title TEXT,
  url TEXT,
  introduced_date TIMESTAMPTZ,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS bill_actions (
  id UUID PRIMARY KEY,
  legislation_id UUID NOT NULL REFERENCES legislation(id),
  action_date TIMESTAMPTZ NOT NULL,
  text TEXT NOT NULL,
  action_type TEXT NOT NULL,
  action_code TEXT,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_bill_actions_dedup
  ON bill_actions(legislation_id, action_date);

CREATE TABLE IF NOT EXISTS bill_summaries (
  id UUID PRIMARY KEY,
  legislation_id UUID NOT NULL REFERENCES legislation(id),
  version_code TEXT NOT NULL,
  text TEXT NOT NULL,
  action_desc TEXT,
  action_date TIMESTAMPTZ,
  update_date TIMESTAMPTZ,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  UNIQUE (legislation_id, version_code)
);

CREATE TABLE IF NOT EXISTS votes (
  id UUID PRIMARY KEY,
  congress INTEGER NOT NULL,
  chamber TEXT NOT NULL,
  roll_call INTEGER NOT NULL,
  session_number INTEGER,
  vote_date TIMESTAMPTZ NOT NULL,
  question TEXT,
  vote_type TEXT,
  result TEXT,
  legislation_number TEXT,
  legislation_name_id TEXT,
  yea_total INTEGER NOT NULL DEFAULT 0,
  nay_total INTEGER NOT NULL DEFAULT 0,
  present_total INTEGER NOT NULL DEFAULT 0,
  not_voting_total INTEGER NOT NULL DEFAULT 0,
  voting_total INTEGER NOT NULL DEFAULT 0,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  UNIQUE (congress, chamber, roll_call)
);

CREATE TABLE IF NOT EXISTS member_votes (
  id UUID PRIMARY KEY,
  vote_id UUID NOT NULL REFERENCES votes(id),
  member_id UUID NOT NULL REFERENCES members(id),
  vote_position TEXT NOT NULL,
  party TEXT,
  state TEXT,
  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  UNIQUE (vote_id, member_id)
);
"#;

/// Postgres-backed [`Store`] with an explicit connect/close lifecycle scoped
/// to one run.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn legislation_from_row(row: &PgRow) -> Result<Legislation, StoreError> {
    Ok(Legislation {
        id: row.try_get("id")?,
        name_id: row.try_get("name_id")?,
        congress: row.try_get("congress")?,
        bill_type: row.try_get("bill_type")?,
        number: row.try_get("number")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        introduced_date: row.try_get("introduced_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn action_from_row(row: &PgRow) -> Result<BillAction, StoreError> {
    Ok(BillAction {
        id: row.try_get("id")?,
        legislation_id: row.try_get("legislation_id")?,
        action_date: row.try_get("action_date")?,
        text: row.try_get("text")?,
        action_type: row.try_get("action_type")?,
        action_code: row.try_get("action_code")?,
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<BillSummary, StoreError> {
    Ok(BillSummary {
        id: row.try_get("id")?,
        legislation_id: row.try_get("legislation_id")?,
        version_code: row.try_get("version_code")?,
        text: row.try_get("text")?,
        action_desc: row.try_get("action_desc")?,
        action_date: row.try_get("action_date")?,
        update_date: row.try_get("update_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn vote_from_row(row: &PgRow) -> Result<Vote, StoreError> {
    Ok(Vote {
        id: row.try_get("id")?,
        congress: row.try_get("congress")?,
        chamber: row.try_get("chamber")?,
        roll_call: row.try_get("roll_call")?,
        session_number: row.try_get("session_number")?,
        vote_date: row.try_get("vote_date")?,
        question: row.try_get("question")?,
        vote_type: row.try_get("vote_type")?,
        result: row.try_get("result")?,
        legislation_number: row.try_get("legislation_number")?,
        legislation_name_id: row.try_get("legislation_name_id")?,
        yea_total: row.try_get("yea_total")?,
        nay_total: row.try_get("nay_total")?,
        present_total: row.try_get("present_total")?,
        not_voting_total: row.try_get("not_voting_total")?,
        voting_total: row.try_get("voting_total")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn legislation_by_name_id(
        &self,
        name_id: &str,
    ) -> Result<Option<Legislation>, StoreError> {
        let row = sqlx::query("SELECT * FROM legislation WHERE name_id = $1")
            .bind(name_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(legislation_from_row).transpose()
    }

    async fn create_legislation(&self, rec: NewLegislation) -> Result<Legislation, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO legislation
              (id, name_id, congress, bill_type, number, title, url, introduced_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&rec.name_id)
        .bind(rec.congress)
        .bind(&rec.bill_type)
        .bind(&rec.number)
        .bind(&rec.title)
        .bind(&rec.url)
        .bind(rec.introduced_date)
        .fetch_one(&self.pool)
        .await?;
        legislation_from_row(&row)
    }

    async fn update_legislation(
        &self,
        id: Uuid,
        changes: LegislationChanges,
    ) -> Result<Legislation, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE legislation
               SET title = $2,
                   url = $3,
                   introduced_date = $4,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.url)
        .bind(changes.introduced_date)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => legislation_from_row(&row),
            None => Err(StoreError::MissingRow {
                entity: "legislation",
                id,
            }),
        }
    }

    async fn action_exists(
        &self,
        legislation_id: Uuid,
        action_date: DateTime<Utc>,
        text: &str,
        action_type: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
              SELECT 1 FROM bill_actions
               WHERE legislation_id = $1
                 AND action_date = $2
                 AND text = $3
                 AND action_type = $4
            ) AS present
            "#,
        )
        .bind(legislation_id)
        .bind(action_date)
        .bind(text)
        .bind(action_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn create_action(&self, rec: NewBillAction) -> Result<BillAction, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO bill_actions
              (id, legislation_id, action_date, text, action_type, action_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rec.legislation_id)
        .bind(rec.action_date)
        .bind(&rec.text)
        .bind(&rec.action_type)
        .bind(&rec.action_code)
        .fetch_one(&self.pool)
        .await?;
        action_from_row(&row)
    }

    async fn summary_by_version(
        &self,
        legislation_id: Uuid,
        version_code: &str,
    ) -> Result<Option<BillSummary>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM bill_summaries WHERE legislation_id = $1 AND version_code = $2",
        )
        .bind(legislation_id)
        .bind(version_code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn create_summary(&self, rec: NewBillSummary) -> Result<BillSummary, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO bill_summaries
              (id, legislation_id, version_code, text, action_desc, action_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rec.legislation_id)
        .bind(&rec.version_code)
        .bind(&rec.text)
        .bind(&rec.action_desc)
        .bind(rec.action_date)
        .bind(rec.update_date)
        .fetch_one(&self.pool)
        .await?;
        summary_from_row(&row)
    }

    async fn update_summary(
        &self,
        id: Uuid,
        changes: BillSummaryChanges,
    ) -> Result<BillSummary, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE bill_summaries
               SET text = $2,
                   action_desc = $3,
                   action_date = $4,
                   update_date = $5,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.text)
        .bind(&changes.action_desc)
        .bind(changes.action_date)
        .bind(changes.update_date)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => summary_from_row(&row),
            None => Err(StoreError::MissingRow {
                entity: "bill_summary",
                id,
            }),
        }
    }

    async fn vote_by_roll_call(
        &self,
        congress: i32,
        chamber: &str,
        roll_call: i32,
    ) -> Result<Option<Vote>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM votes WHERE congress = $1 AND chamber = $2 AND roll_call = $3",
        )
        .bind(congress)
        .bind(chamber)
        .bind(roll_call)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(vote_from_row).transpose()
    }

    async fn create_vote(&self, rec: NewVote) -> Result<Vote, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO votes
              (id, congress, chamber, roll_call, session_number, vote_date,
               question, vote_type, result, legislation_number, legislation_name_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rec.congress)
        .bind(&rec.chamber)
        .bind(rec.roll_call)
        .bind(rec.session_number)
        .bind(rec.vote_date)
        .bind(&rec.question)
        .bind(&rec.vote_type)
        .bind(&rec.result)
        .bind(&rec.legislation_number)
        .bind(&rec.legislation_name_id)
        .fetch_one(&self.pool)
        .await?;
        vote_from_row(&row)
    }

    async fn update_vote(&self, id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE votes
               SET session_number = $2,
                   vote_date = $3,
                   question = $4,
                   vote_type = $5,
                   result = $6,
                   legislation_number = $7,
                   legislation_name_id = $8,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.session_number)
        .bind(changes.vote_date)
        .bind(&changes.question)
        .bind(&changes.vote_type)
        .bind(&changes.result)
        .bind(&changes.legislation_number)
        .bind(&changes.legislation_name_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => vote_from_row(&row),
            None => Err(StoreError::MissingRow { entity: "vote", id }),
        }
    }

    async fn set_vote_totals(&self, id: Uuid, totals: VoteTotals) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE votes
               SET yea_total = $2,
                   nay_total = $3,
                   present_total = $4,
                   not_voting_total = $5,
                   voting_total = $6,
                   updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(totals.yea)
        .bind(totals.nay)
        .bind(totals.present)
        .bind(totals.not_voting)
        .bind(totals.voting_total())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow { entity: "vote", id });
        }
        Ok(())
    }

    async fn member_ids_with_votes(&self, vote_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        let rows = sqlx::query("SELECT member_id FROM member_votes WHERE vote_id = $1")
            .bind(vote_id)
            .fetch_all(&self.pool)
            .await?;
        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get("member_id")?);
        }
        Ok(ids)
    }

    async fn create_member_votes(&self, rows: Vec<NewMemberVote>) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in &rows {
            sqlx::query(
                r#"
                INSERT INTO member_votes
                  (id, vote_id, member_id, vote_position, party, state)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rec.vote_id)
            .bind(rec.member_id)
            .bind(rec.position.as_str())
            .bind(&rec.party)
            .bind(&rec.state)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn all_members(&self) -> Result<Vec<Member>, StoreError> {
        let rows = sqlx::query("SELECT * FROM members ORDER BY bioguide_id")
            .fetch_all(&self.pool)
            .await?;
        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            members.push(Member {
                id: row.try_get("id")?,
                bioguide_id: row.try_get("bioguide_id")?,
                name: row.try_get("name")?,
                party: row.try_get("party")?,
                state: row.try_get("state")?,
            });
        }
        Ok(members)
    }
}

/// In-memory [`Store`] used as a test double and for local dry runs.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Debug, Default)]
struct MemInner {
    legislation: Vec<Legislation>,
    actions: Vec<BillAction>,
    summaries: Vec<BillSummary>,
    votes: Vec<Vote>,
    member_votes: Vec<MemberVote>,
    members: Vec<Member>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_member(&self, member: Member) {
        self.inner.lock().expect("mem store poisoned").members.push(member);
    }

    pub fn legislation_rows(&self) -> Vec<Legislation> {
        self.inner.lock().expect("mem store poisoned").legislation.clone()
    }

    pub fn action_rows(&self) -> Vec<BillAction> {
        self.inner.lock().expect("mem store poisoned").actions.clone()
    }

    pub fn summary_rows(&self) -> Vec<BillSummary> {
        self.inner.lock().expect("mem store poisoned").summaries.clone()
    }

    pub fn vote_rows(&self) -> Vec<Vote> {
        self.inner.lock().expect("mem store poisoned").votes.clone()
    }

    pub fn member_vote_rows(&self) -> Vec<MemberVote> {
        self.inner.lock().expect("mem store poisoned").member_votes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().expect("mem store poisoned")
    }
}

#[async_trait]
impl Store for MemStore {
    async fn legislation_by_name_id(
        &self,
        name_id: &str,
    ) -> Result<Option<Legislation>, StoreError> {
        Ok(self
            .lock()
            .legislation
            .iter()
            .find(|l| l.name_id == name_id)
            .cloned())
    }

    async fn create_legislation(&self, rec: NewLegislation) -> Result<Legislation, StoreError> {
        let now = Utc::now();
        let legislation = Legislation {
            id: Uuid::new_v4(),
            name_id: rec.name_id,
            congress: rec.congress,
            bill_type: rec.bill_type,
            number: rec.number,
            title: rec.title,
            url: rec.url,
            introduced_date: rec.introduced_date,
            created_at: now,
            updated_at: now,
        };
        self.lock().legislation.push(legislation.clone());
        Ok(legislation)
    }

    async fn update_legislation(
        &self,
        id: Uuid,
        changes: LegislationChanges,
    ) -> Result<Legislation, StoreError> {
        let mut inner = self.lock();
        let row = inner
            .legislation
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::MissingRow {
                entity: "legislation",
                id,
            })?;
        row.title = changes.title;
        row.url = changes.url;
        row.introduced_date = changes.introduced_date;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn action_exists(
        &self,
        legislation_id: Uuid,
        action_date: DateTime<Utc>,
        text: &str,
        action_type: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.lock().actions.iter().any(|a| {
            a.legislation_id == legislation_id
                && a.action_date == action_date
                && a.text == text
                && a.action_type == action_type
        }))
    }

    async fn create_action(&self, rec: NewBillAction) -> Result<BillAction, StoreError> {
        let action = BillAction {
            id: Uuid::new_v4(),
            legislation_id: rec.legislation_id,
            action_date: rec.action_date,
            text: rec.text,
            action_type: rec.action_type,
            action_code: rec.action_code,
            created_at: Utc::now(),
        };
        self.lock().actions.push(action.clone());
        Ok(action)
    }

    async fn summary_by_version(
        &self,
        legislation_id: Uuid,
        version_code: &str,
    ) -> Result<Option<BillSummary>, StoreError> {
        Ok(self
            .lock()
            .summaries
            .iter()
            .find(|s| s.legislation_id == legislation_id && s.version_code == version_code)
            .cloned())
    }

    async fn create_summary(&self, rec: NewBillSummary) -> Result<BillSummary, StoreError> {
        let now = Utc::now();
        let summary = BillSummary {
            id: Uuid::new_v4(),
            legislation_id: rec.legislation_id,
            version_code: rec.version_code,
            text: rec.text,
            action_desc: rec.action_desc,
            action_date: rec.action_date,
            update_date: rec.update_date,
            created_at: now,
            updated_at: now,
        };
        self.lock().summaries.push(summary.clone());
        Ok(summary)
    }

    async fn update_summary(
        &self,
        id: Uuid,
        changes: BillSummaryChanges,
    ) -> Result<BillSummary, StoreError> {
        let mut inner = self.lock();
        let row = inner
            .summaries
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::MissingRow {
                entity: "bill_summary",
                id,
            })?;
        row.text = changes.text;
        row.action_desc = changes.action_desc;
        row.action_date = changes.action_date;
        row.update_date = changes.update_date;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn vote_by_roll_call(
        &self,
        congress: i32,
        chamber: &str,
        roll_call: i32,
    ) -> Result<Option<Vote>, StoreError> {
        Ok(self
            .lock()
            .votes
            .iter()
            .find(|v| v.congress == congress && v.chamber == chamber && v.roll_call == roll_call)
            .cloned())
    }

    async fn create_vote(&self, rec: NewVote) -> Result<Vote, StoreError> {
        let now = Utc::now();
        let vote = Vote {
            id: Uuid::new_v4(),
            congress: rec.congress,
            chamber: rec.chamber,
            roll_call: rec.roll_call,
            session_number: rec.session_number,
            vote_date: rec.vote_date,
            question: rec.question,
            vote_type: rec.vote_type,
            result: rec.result,
            legislation_number: rec.legislation_number,
            legislation_name_id: rec.legislation_name_id,
            yea_total: 0,
            nay_total: 0,
            present_total: 0,
            not_voting_total: 0,
            voting_total: 0,
            created_at: now,
            updated_at: now,
        };
        self.lock().votes.push(vote.clone());
        Ok(vote)
    }

    async fn update_vote(&self, id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError> {
        let mut inner = self.lock();
        let row = inner
            .votes
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::MissingRow { entity: "vote", id })?;
        row.session_number = changes.session_number;
        row.vote_date = changes.vote_date;
        row.question = changes.question;
        row.vote_type = changes.vote_type;
        row.result = changes.result;
        row.legislation_number = changes.legislation_number;
        row.legislation_name_id = changes.legislation_name_id;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_vote_totals(&self, id: Uuid, totals: VoteTotals) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let row = inner
            .votes
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::MissingRow { entity: "vote", id })?;
        row.yea_total = totals.yea;
        row.nay_total = totals.nay;
        row.present_total = totals.present;
        row.not_voting_total = totals.not_voting;
        row.voting_total = totals.voting_total();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn member_ids_with_votes(&self, vote_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        Ok(self
            .lock()
            .member_votes
            .iter()
            .filter(|mv| mv.vote_id == vote_id)
            .map(|mv| mv.member_id)
            .collect())
    }

    async fn create_member_votes(&self, rows: Vec<NewMemberVote>) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let count = rows.len();
        for rec in rows {
            inner.member_votes.push(MemberVote {
                id: Uuid::new_v4(),
                vote_id: rec.vote_id,
                member_id: rec.member_id,
                position: rec.position,
                party: rec.party,
                state: rec.state,
                created_at: Utc::now(),
            });
        }
        Ok(count)
    }

    async fn all_members(&self) -> Result<Vec<Member>, StoreError> {
        Ok(self.lock().members.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.congress.gov/v3".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(20),
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// congress.gov v3 fetch collaborator. Transport-level retries with capped
/// exponential backoff happen here; callers treat any returned error as an
/// immediate per-resource failure and never retry on top.
#[derive(Debug)]
pub struct CongressClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    backoff: BackoffPolicy,
}

impl CongressClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            backoff: config.backoff,
        })
    }

    /// Latest bills for a congress (first page, maximum page size).
    pub async fn bill_list(&self, congress: i32) -> Result<JsonValue, FetchError> {
        self.get_json(&format!("bill/{congress}"), &[("limit", "250")])
            .await
    }

    pub async fn bill_detail(
        &self,
        congress: i32,
        bill_type: &str,
        number: &str,
    ) -> Result<JsonValue, FetchError> {
        let path = format!(
            "bill/{congress}/{}/{number}",
            bill_type.to_ascii_lowercase()
        );
        self.get_json(&path, &[]).await
    }

    pub async fn bill_actions(
        &self,
        congress: i32,
        bill_type: &str,
        number: &str,
    ) -> Result<JsonValue, FetchError> {
        let path = format!(
            "bill/{congress}/{}/{number}/actions",
            bill_type.to_ascii_lowercase()
        );
        self.get_json(&path, &[("limit", "250")]).await
    }

    pub async fn bill_summaries(
        &self,
        congress: i32,
        bill_type: &str,
        number: &str,
    ) -> Result<JsonValue, FetchError> {
        let path = format!(
            "bill/{congress}/{}/{number}/summaries",
            bill_type.to_ascii_lowercase()
        );
        self.get_json(&path, &[("limit", "250")]).await
    }

    pub async fn house_votes(&self, congress: i32) -> Result<JsonValue, FetchError> {
        self.get_json(&format!("house-vote/{congress}"), &[("limit", "250")])
            .await
    }

    pub async fn house_vote_members(
        &self,
        congress: i32,
        session: i32,
        roll_call: i32,
    ) -> Result<JsonValue, FetchError> {
        self.get_json(
            &format!("house-vote/{congress}/{session}/{roll_call}/members"),
            &[],
        )
        .await
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<JsonValue, FetchError> {
        let url = format!("{}/{path}", self.base_url);
        let span = info_span!("api_fetch", path);
        let _guard = span.enter();

        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.backoff.max_retries {
            let resp_result = self
                .client
                .get(&url)
                .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
                .query(query)
                .send()
                .await;

            match resp_result {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        return Ok(resp.json::<JsonValue>().await?);
                    }

                    let disposition = classify_status(status);
                    if disposition == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    let disposition = classify_reqwest_error(&err);
                    if disposition == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        last_request_error = Some(err);
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        Err(FetchError::Request(
            last_request_error.expect("retry loop should capture a request error"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hill_core::{derive_name_id, VotePosition};

    fn new_bill(name_id: &str) -> NewLegislation {
        NewLegislation {
            name_id: name_id.to_string(),
            congress: 119,
            bill_type: "HR".to_string(),
            number: "1234".to_string(),
            title: Some("Test Act".to_string()),
            url: Some("http://x".to_string()),
            introduced_date: None,
        }
    }

    #[tokio::test]
    async fn mem_store_finds_legislation_by_key() {
        let store = MemStore::new();
        let created = store
            .create_legislation(new_bill("119HR1234"))
            .await
            .expect("create");

        let found = store
            .legislation_by_name_id("119HR1234")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.id, created.id);
        assert!(store
            .legislation_by_name_id("119HR9999")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn mem_store_update_keeps_key_and_created_at() {
        let store = MemStore::new();
        let created = store
            .create_legislation(new_bill(&derive_name_id(119, "HR", "1234")))
            .await
            .expect("create");

        let updated = store
            .update_legislation(
                created.id,
                LegislationChanges {
                    title: Some("Amended Title".to_string()),
                    url: created.url.clone(),
                    introduced_date: None,
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.name_id, "119HR1234");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.title.as_deref(), Some("Amended Title"));
        assert_eq!(store.legislation_rows().len(), 1);
    }

    #[tokio::test]
    async fn action_existence_is_the_full_tuple() {
        let store = MemStore::new();
        let bill = store
            .create_legislation(new_bill("119HR1"))
            .await
            .expect("create");
        let date = hill_core::parse_api_timestamp("2025-02-01").expect("date");

        store
            .create_action(NewBillAction {
                legislation_id: bill.id,
                action_date: date,
                text: "Referred to committee.".to_string(),
                action_type: "IntroReferral".to_string(),
                action_code: None,
            })
            .await
            .expect("insert");

        assert!(store
            .action_exists(bill.id, date, "Referred to committee.", "IntroReferral")
            .await
            .expect("check"));
        // any one field differing means a distinct action
        assert!(!store
            .action_exists(bill.id, date, "Referred to committee.", "Floor")
            .await
            .expect("check"));
        assert!(!store
            .action_exists(bill.id, date, "Passed House.", "IntroReferral")
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn member_vote_preload_is_per_vote() {
        let store = MemStore::new();
        let vote = store
            .create_vote(NewVote {
                congress: 119,
                chamber: hill_core::CHAMBER_HOUSE.to_string(),
                roll_call: 17,
                session_number: Some(1),
                vote_date: Utc::now(),
                question: None,
                vote_type: None,
                result: None,
                legislation_number: None,
                legislation_name_id: None,
            })
            .await
            .expect("vote");

        let member_id = Uuid::new_v4();
        store
            .create_member_votes(vec![NewMemberVote {
                vote_id: vote.id,
                member_id,
                position: VotePosition::Yea,
                party: Some("D".to_string()),
                state: Some("CA".to_string()),
            }])
            .await
            .expect("insert");

        let recorded = store.member_ids_with_votes(vote.id).await.expect("preload");
        assert!(recorded.contains(&member_id));
        let other = store
            .member_ids_with_votes(Uuid::new_v4())
            .await
            .expect("preload");
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn totals_overwrite_replaces_previous_values() {
        let store = MemStore::new();
        let vote = store
            .create_vote(NewVote {
                congress: 119,
                chamber: hill_core::CHAMBER_HOUSE.to_string(),
                roll_call: 3,
                session_number: Some(1),
                vote_date: Utc::now(),
                question: None,
                vote_type: None,
                result: None,
                legislation_number: None,
                legislation_name_id: None,
            })
            .await
            .expect("vote");

        store
            .set_vote_totals(
                vote.id,
                VoteTotals {
                    yea: 7,
                    nay: 2,
                    present: 0,
                    not_voting: 1,
                },
            )
            .await
            .expect("first write");
        store
            .set_vote_totals(
                vote.id,
                VoteTotals {
                    yea: 3,
                    nay: 3,
                    present: 1,
                    not_voting: 0,
                },
            )
            .await
            .expect("second write");

        let row = &store.vote_rows()[0];
        assert_eq!(
            (row.yea_total, row.nay_total, row.present_total, row.not_voting_total),
            (3, 3, 1, 0)
        );
        assert_eq!(row.voting_total, 7);
    }

    #[test]
    fn retryable_statuses_are_server_side() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            RetryDisposition::NonRetryable
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            RetryDisposition::NonRetryable
        );
    }

    #[test]
    fn backoff_logic_is_exponential_and_capped() {
        let policy = BackoffPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(350));
    }
}
