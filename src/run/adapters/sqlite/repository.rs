//! `SQLite` repository implementation for run history storage.

use super::{
    models::{GroundTruthRow, MarkerRow, NewRunRow, RunFinalizationChangeset, RunRow},
    schema::{BOOTSTRAP_SQL, processed_tickets, ticket_ground_truth, ticket_runs},
};
use crate::run::{
    domain::{
        GroundTruthLabel, PrOutcome, ProcessedTicketMarker, RunFinalization, RunId, RunRecord,
        RunState, RunStatus, TicketId,
    },
    ports::{RunRepository, RunRepositoryError, RunRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use diesel::upsert::excluded;
use std::path::Path;

/// `SQLite` connection pool type used by run adapters.
pub type RunSqlitePool = Pool<ConnectionManager<SqliteConnection>>;

const POOL_SIZE: u32 = 4;

#[derive(Debug)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, connection: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        connection
            .batch_execute(
                "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;",
            )
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

impl From<DieselError> for RunRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `SQLite`-backed run repository.
#[derive(Debug, Clone)]
pub struct SqliteRunRepository {
    pool: RunSqlitePool,
}

impl SqliteRunRepository {
    /// Creates a repository from an existing pool whose schema is in place.
    #[must_use]
    pub const fn new(pool: RunSqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_path` and
    /// ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`RunRepositoryError::Persistence`] when the directory, pool
    /// or schema cannot be created.
    pub fn open(database_path: &Path) -> RunRepositoryResult<Self> {
        if let Some(parent) = database_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(RunRepositoryError::persistence)?;
        }
        let manager =
            ConnectionManager::<SqliteConnection>::new(database_path.to_string_lossy().as_ref());
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .connection_customizer(Box::new(ConnectionPragmas))
            .build(manager)
            .map_err(RunRepositoryError::persistence)?;
        let mut connection = pool.get().map_err(RunRepositoryError::persistence)?;
        connection.batch_execute(BOOTSTRAP_SQL)?;
        Ok(Self::new(pool))
    }

    pub(super) async fn run_blocking<F, T>(&self, f: F) -> RunRepositoryResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> RunRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(RunRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(RunRepositoryError::persistence)?
    }
}

fn invalid(err: impl std::fmt::Display) -> RunRepositoryError {
    RunRepositoryError::InvalidData(err.to_string())
}

fn to_i64(value: u64) -> RunRepositoryResult<i64> {
    i64::try_from(value).map_err(invalid)
}

fn to_u64(value: i64) -> RunRepositoryResult<u64> {
    u64::try_from(value).map_err(invalid)
}

fn to_changeset(finalization: &RunFinalization) -> RunRepositoryResult<RunFinalizationChangeset> {
    let snapshot =
        serde_json::to_string(&finalization.state_snapshot).map_err(RunRepositoryError::persistence)?;
    Ok(RunFinalizationChangeset {
        status: finalization.status.as_str().to_owned(),
        completed_at: Some(finalization.completed_at.naive_utc()),
        duration_seconds: Some(finalization.duration_seconds),
        completeness_score: finalization.completeness_score,
        ticket_deemed_incomplete: finalization.ticket_deemed_incomplete,
        clarification_comment_posted: finalization.clarification_comment_posted,
        plan_generated: finalization.plan_generated,
        code_proposal_generated: finalization.code_proposal_generated,
        tests_suggested: finalization.tests_suggested,
        pr_url: finalization.pr_url.clone(),
        pr_number: finalization.pr_number.map(to_i64).transpose()?,
        pr_branch: finalization.pr_branch.clone(),
        pr_outcome: finalization.pr_outcome.as_str().to_owned(),
        llm_call_count: to_i64(finalization.llm_call_count)?,
        token_count: to_i64(finalization.token_count)?,
        error_occurred: finalization.error_occurred,
        error_phase: finalization.error_phase.clone(),
        error_message: finalization.error_message.clone(),
        state_snapshot: Some(snapshot),
    })
}

fn row_to_record(row: RunRow) -> RunRepositoryResult<RunRecord> {
    let state_snapshot = row
        .state_snapshot
        .map(|snapshot| serde_json::from_str(&snapshot))
        .transpose()
        .map_err(RunRepositoryError::persistence)?;
    Ok(RunRecord {
        run_id: RunId::parse(&row.id)?,
        ticket_id: TicketId::new(row.ticket_id)?,
        status: RunStatus::try_from(row.status.as_str()).map_err(invalid)?,
        started_at: row.started_at.and_utc(),
        completed_at: row.completed_at.map(|at| at.and_utc()),
        duration_seconds: row.duration_seconds,
        completeness_score: row.completeness_score,
        ticket_deemed_incomplete: row.ticket_deemed_incomplete,
        clarification_comment_posted: row.clarification_comment_posted,
        plan_generated: row.plan_generated,
        code_proposal_generated: row.code_proposal_generated,
        tests_suggested: row.tests_suggested,
        pr_url: row.pr_url,
        pr_number: row.pr_number.map(to_u64).transpose()?,
        pr_branch: row.pr_branch,
        pr_outcome: PrOutcome::try_from(row.pr_outcome.as_str()).map_err(invalid)?,
        llm_call_count: to_u64(row.llm_call_count)?,
        token_count: to_u64(row.token_count)?,
        error_occurred: row.error_occurred,
        error_phase: row.error_phase,
        error_message: row.error_message,
        state_snapshot,
    })
}

fn row_to_marker(row: MarkerRow) -> RunRepositoryResult<ProcessedTicketMarker> {
    Ok(ProcessedTicketMarker {
        ticket_id: TicketId::new(row.ticket_id)?,
        first_seen_at: row.first_seen_at.and_utc(),
        last_run_id: row.last_run_id.as_deref().map(RunId::parse).transpose()?,
        reprocess_requested: row.reprocess_requested,
    })
}

fn rows_to_records(rows: Vec<RunRow>) -> RunRepositoryResult<Vec<RunRecord>> {
    rows.into_iter().map(row_to_record).collect()
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create_run(
        &self,
        run_id: RunId,
        ticket_id: &TicketId,
        started_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let row = NewRunRow {
            id: run_id.to_string(),
            ticket_id: ticket_id.as_str().to_owned(),
            status: RunStatus::Running.as_str().to_owned(),
            started_at: started_at.naive_utc(),
            pr_outcome: PrOutcome::NotCreated.as_str().to_owned(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(ticket_runs::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        RunRepositoryError::DuplicateRun(run_id)
                    }
                    _ => RunRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn mark_ticket_queued(
        &self,
        ticket_id: &TicketId,
        run_id: RunId,
        queued_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let row = MarkerRow {
            ticket_id: ticket_id.as_str().to_owned(),
            first_seen_at: queued_at.naive_utc(),
            last_run_id: Some(run_id.to_string()),
            reprocess_requested: false,
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(processed_tickets::table)
                .values(&row)
                .on_conflict(processed_tickets::ticket_id)
                .do_update()
                .set((
                    processed_tickets::last_run_id.eq(excluded(processed_tickets::last_run_id)),
                    processed_tickets::reprocess_requested.eq(false),
                ))
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn is_ticket_processed(&self, ticket_id: &TicketId) -> RunRepositoryResult<bool> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let reprocess = processed_tickets::table
                .find(key)
                .select(processed_tickets::reprocess_requested)
                .first::<bool>(connection)
                .optional()?;
            Ok(reprocess.is_some_and(|requested| !requested))
        })
        .await
    }

    async fn request_reprocess(&self, ticket_id: &TicketId) -> RunRepositoryResult<()> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            diesel::update(processed_tickets::table.find(key))
                .set(processed_tickets::reprocess_requested.eq(true))
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn find_marker(
        &self,
        ticket_id: &TicketId,
    ) -> RunRepositoryResult<Option<ProcessedTicketMarker>> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = processed_tickets::table
                .find(key)
                .select(MarkerRow::as_select())
                .first::<MarkerRow>(connection)
                .optional()?;
            row.map(row_to_marker).transpose()
        })
        .await
    }

    async fn finalize_run(
        &self,
        run_id: RunId,
        final_state: &RunState,
        finalized_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let finalization = RunFinalization::from_state(final_state, finalized_at)
            .map_err(RunRepositoryError::persistence)?;
        let changeset = to_changeset(&finalization)?;
        let key = run_id.to_string();
        self.run_blocking(move |connection| {
            connection.immediate_transaction(|tx| {
                let status = ticket_runs::table
                    .find(key.as_str())
                    .select(ticket_runs::status)
                    .first::<String>(tx)
                    .optional()?
                    .ok_or(RunRepositoryError::NotFound(run_id))?;
                if status != RunStatus::Running.as_str() {
                    return Err(RunRepositoryError::AlreadyFinalized(run_id));
                }
                diesel::update(ticket_runs::table.find(key.as_str()))
                    .set(&changeset)
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }

    async fn find_run(&self, run_id: RunId) -> RunRepositoryResult<Option<RunRecord>> {
        let key = run_id.to_string();
        self.run_blocking(move |connection| {
            let row = ticket_runs::table
                .find(key)
                .select(RunRow::as_select())
                .first::<RunRow>(connection)
                .optional()?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn runs_for_ticket(&self, ticket_id: &TicketId) -> RunRepositoryResult<Vec<RunRecord>> {
        let key = ticket_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = ticket_runs::table
                .filter(ticket_runs::ticket_id.eq(key))
                .order((ticket_runs::started_at.asc(), ticket_runs::id.asc()))
                .select(RunRow::as_select())
                .load::<RunRow>(connection)?;
            rows_to_records(rows)
        })
        .await
    }

    async fn pending_pr_runs(&self) -> RunRepositoryResult<Vec<RunRecord>> {
        self.run_blocking(move |connection| {
            let rows = ticket_runs::table
                .filter(ticket_runs::pr_outcome.eq(PrOutcome::Pending.as_str()))
                .order((ticket_runs::started_at.asc(), ticket_runs::id.asc()))
                .select(RunRow::as_select())
                .load::<RunRow>(connection)?;
            rows_to_records(rows)
        })
        .await
    }

    async fn set_pr_outcome(&self, run_id: RunId, outcome: PrOutcome) -> RunRepositoryResult<()> {
        let key = run_id.to_string();
        self.run_blocking(move |connection| {
            let updated = diesel::update(ticket_runs::table.find(key))
                .set(ticket_runs::pr_outcome.eq(outcome.as_str()))
                .execute(connection)?;
            if updated == 0 {
                return Err(RunRepositoryError::NotFound(run_id));
            }
            Ok(())
        })
        .await
    }

    async fn set_ground_truth(&self, label: &GroundTruthLabel) -> RunRepositoryResult<()> {
        let row = GroundTruthRow {
            ticket_id: label.ticket_id.as_str().to_owned(),
            truly_incomplete: label.truly_incomplete,
            labeled_by: label.labeled_by.clone(),
            labeled_at: label.labeled_at.naive_utc(),
            notes: label.notes.clone(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(ticket_ground_truth::table)
                .values(&row)
                .on_conflict(ticket_ground_truth::ticket_id)
                .do_update()
                .set((
                    ticket_ground_truth::truly_incomplete
                        .eq(excluded(ticket_ground_truth::truly_incomplete)),
                    ticket_ground_truth::labeled_by.eq(excluded(ticket_ground_truth::labeled_by)),
                    ticket_ground_truth::labeled_at.eq(excluded(ticket_ground_truth::labeled_at)),
                    ticket_ground_truth::notes.eq(excluded(ticket_ground_truth::notes)),
                ))
                .execute(connection)?;
            Ok(())
        })
        .await
    }
}
