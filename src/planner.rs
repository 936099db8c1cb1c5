use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conflict;
use crate::delivery::{ConflictKind, Delivery, DeliveryKey, DeliveryKind, DeliveryStatus};
use crate::generator::{self, GenerateError};
use crate::holiday::HolidayCalendar;
use crate::persistence::{DeliveryStore, EntregaPayload, EntregaRecord, PersistenceError};
use crate::rule::Agrupamento;

/// The fully reconciled schedule of one displayed month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub deliveries: Vec<Delivery>,
    /// Dates whose auto-generated entries were removed by tombstones.
    pub suppressed: Vec<NaiveDate>,
}

/// Proof that a regeneration started under a given planner epoch. Assembly
/// results carry the epoch along, so a reload that was overtaken by a newer
/// one can be rejected at install time.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    epoch: u64,
    year: i32,
    month: u32,
    candidates: Vec<Delivery>,
}

impl GenerationTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn candidates(&self) -> &[Delivery] {
        &self.candidates
    }
}

/// A reconciled month still tagged with the epoch of the ticket it came from.
#[derive(Debug, Clone)]
pub struct MonthAssembly {
    epoch: u64,
    view: MonthView,
}

impl MonthAssembly {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn view(&self) -> &MonthView {
        &self.view
    }
}

/// A newer regeneration started after this assembly's ticket was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleGeneration {
    pub current: u64,
    pub superseded: u64,
}

impl fmt::Display for StaleGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation {} was superseded by generation {}",
            self.superseded, self.current
        )
    }
}

impl std::error::Error for StaleGeneration {}

#[derive(Debug)]
pub enum PlannerError {
    Persistence(PersistenceError),
    Generate(GenerateError),
    Stale(StaleGeneration),
    UnknownDelivery(DeliveryKey),
    NoMonthLoaded,
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Persistence(err) => write!(f, "backend error: {err}"),
            PlannerError::Generate(err) => write!(f, "{err}"),
            PlannerError::Stale(err) => write!(f, "{err}"),
            PlannerError::UnknownDelivery(key) => write!(f, "unknown delivery {key}"),
            PlannerError::NoMonthLoaded => write!(f, "no month loaded"),
        }
    }
}

impl std::error::Error for PlannerError {}

impl From<PersistenceError> for PlannerError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<GenerateError> for PlannerError {
    fn from(value: GenerateError) -> Self {
        Self::Generate(value)
    }
}

impl From<StaleGeneration> for PlannerError {
    fn from(value: StaleGeneration) -> Self {
        Self::Stale(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub deliveries: Vec<Delivery>,
    pub suppressed: Vec<NaiveDate>,
}

/// Merge persisted rows into the generated schedule. Tombstones remove the
/// generated entries of their date; a normal row overwrites the draft entry
/// sharing its date (persisted truth wins for id, kind and notes) or is
/// appended when no draft matches. Status and conflicts are left for the
/// detector, which must run after this.
pub fn reconcile(
    generated: Vec<Delivery>,
    persisted: &[EntregaRecord],
    agrupamento: &Agrupamento,
) -> ReconcileOutcome {
    let (tombstones, normals): (Vec<&EntregaRecord>, Vec<&EntregaRecord>) = persisted
        .iter()
        .partition(|record| record.tipo_entrega.is_tombstone());

    let mut deliveries = generated;
    let mut suppressed = Vec::new();
    for tombstone in tombstones {
        let before = deliveries.len();
        deliveries.retain(|d| d.date != tombstone.data_entrega);
        if deliveries.len() < before {
            suppressed.push(tombstone.data_entrega);
        }
    }

    for record in normals {
        // Only draft entries yield to a persisted row; two persisted rows on
        // one date coexist and surface as a same-day conflict instead.
        let slot = deliveries
            .iter_mut()
            .find(|d| d.date == record.data_entrega && d.key.is_draft());
        match slot {
            Some(existing) => {
                existing.key = DeliveryKey::Persisted(record.id);
                existing.kind = record.tipo_entrega;
                existing.notes = record.observacoes.clone();
            }
            None => deliveries.push(
                record
                    .clone()
                    .into_delivery(agrupamento.schools, agrupamento.products),
            ),
        }
    }

    deliveries.sort_by_key(|d| d.date);
    ReconcileOutcome {
        deliveries,
        suppressed,
    }
}

/// Owns the displayed month: generates, reconciles, annotates and applies
/// user mutations, always re-deriving the final list through the same
/// pipeline.
pub struct DeliveryPlanner {
    store: Arc<dyn DeliveryStore>,
    calendar: Arc<HolidayCalendar>,
    agrupamento: Agrupamento,
    epoch: u64,
    view: Option<MonthView>,
}

impl DeliveryPlanner {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        calendar: Arc<HolidayCalendar>,
        agrupamento: Agrupamento,
    ) -> Self {
        Self {
            store,
            calendar,
            agrupamento,
            epoch: 0,
            view: None,
        }
    }

    pub fn agrupamento(&self) -> &Agrupamento {
        &self.agrupamento
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    pub fn view(&self) -> Option<&MonthView> {
        self.view.as_ref()
    }

    /// Start a regeneration of `year`/`month`. Bumps the epoch, so any
    /// assembly still in flight from an earlier ticket becomes stale.
    pub fn begin_month(&mut self, year: i32, month: u32) -> Result<GenerationTicket, PlannerError> {
        let candidates = generator::generate(&self.agrupamento, year, month)?;
        self.epoch += 1;
        Ok(GenerationTicket {
            epoch: self.epoch,
            year,
            month,
            candidates,
        })
    }

    /// Fetch, reconcile and annotate the ticket's month. Takes `&self`: the
    /// planner stays usable while the assembly is awaited.
    pub async fn assemble(&self, ticket: GenerationTicket) -> Result<MonthAssembly, PlannerError> {
        let persisted = self.month_records(ticket.year, ticket.month).await?;
        let outcome = reconcile(ticket.candidates, &persisted, &self.agrupamento);
        let annotated = conflict::annotate_holidays(outcome.deliveries, &self.calendar).await;
        let deliveries = conflict::detect(annotated);
        Ok(MonthAssembly {
            epoch: ticket.epoch,
            view: MonthView {
                year: ticket.year,
                month: ticket.month,
                deliveries,
                suppressed: outcome.suppressed,
            },
        })
    }

    /// Adopt an assembled month, unless a newer regeneration has started
    /// since its ticket was issued.
    pub fn install(&mut self, assembly: MonthAssembly) -> Result<(), StaleGeneration> {
        if assembly.epoch != self.epoch {
            let stale = StaleGeneration {
                current: self.epoch,
                superseded: assembly.epoch,
            };
            warn!(%stale, "discarding stale month assembly");
            return Err(stale);
        }
        self.view = Some(assembly.view);
        Ok(())
    }

    /// The full pipeline: generate, fetch, reconcile, annotate, install.
    pub async fn load_month(&mut self, year: i32, month: u32) -> Result<&MonthView, PlannerError> {
        let ticket = self.begin_month(year, month)?;
        let assembly = self.assemble(ticket).await?;
        self.install(assembly)?;
        let view = self.current_view()?;
        info!(
            year,
            month,
            deliveries = view.deliveries.len(),
            suppressed = view.suppressed.len(),
            "month loaded"
        );
        Ok(view)
    }

    /// Persist a new delivery, then re-derive the displayed month from the
    /// backend rather than patching the local list.
    pub async fn create_delivery(
        &mut self,
        date: NaiveDate,
        kind: DeliveryKind,
        notes: Option<String>,
    ) -> Result<&MonthView, PlannerError> {
        let payload = EntregaPayload::new(date, kind, notes);
        let record = self.store.create(self.agrupamento.id, &payload).await?;
        info!(id = record.id, date = %date, kind = kind.as_str(), "delivery created");
        self.reload_for(date).await
    }

    /// Persist changes to a delivery. Draft keys have no backend row yet:
    /// if the target date already has one the edit lands there, otherwise a
    /// new row is created.
    pub async fn update_delivery(
        &mut self,
        key: DeliveryKey,
        date: NaiveDate,
        kind: DeliveryKind,
        notes: Option<String>,
    ) -> Result<&MonthView, PlannerError> {
        let payload = EntregaPayload::new(date, kind, notes);
        match key.persisted_id() {
            Some(id) => {
                self.store.update(id, &payload).await?;
                info!(id, date = %date, "delivery updated");
            }
            None => {
                let existing = self
                    .month_records(date.year(), date.month())
                    .await?
                    .into_iter()
                    .find(|r| !r.tipo_entrega.is_tombstone() && r.data_entrega == date);
                match existing {
                    Some(record) => {
                        self.store.update(record.id, &payload).await?;
                        info!(id = record.id, date = %date, "draft edit landed on existing row");
                    }
                    None => {
                        let record = self.store.create(self.agrupamento.id, &payload).await?;
                        info!(id = record.id, date = %date, "draft edit persisted as new row");
                    }
                }
            }
        }
        self.reload_for(date).await
    }

    /// Remove a delivery. Persisted rows are deleted on the backend; an
    /// auto-generated draft has nothing to delete, so a tombstone row is
    /// written at its date to keep later regenerations from re-materializing
    /// it.
    pub async fn delete_delivery(&mut self, key: DeliveryKey) -> Result<&MonthView, PlannerError> {
        let view = self.view.as_ref().ok_or(PlannerError::NoMonthLoaded)?;
        let delivery = view
            .deliveries
            .iter()
            .find(|d| d.key == key)
            .ok_or(PlannerError::UnknownDelivery(key))?;
        let date = delivery.date;

        match key.persisted_id() {
            Some(id) => {
                self.store.delete(id).await?;
                info!(id, date = %date, "delivery deleted");
            }
            None => {
                let tombstone = EntregaPayload::new(date, DeliveryKind::Excluida, None);
                let record = self.store.create(self.agrupamento.id, &tombstone).await?;
                info!(id = record.id, date = %date, "generated delivery tombstoned");
            }
        }
        self.reload_for(date).await
    }

    /// Re-date an entry in memory and re-derive its annotations. No backend
    /// call is made; persisting a move is an explicit follow-up save.
    pub async fn move_delivery(
        &mut self,
        key: DeliveryKey,
        new_date: NaiveDate,
    ) -> Result<&MonthView, PlannerError> {
        let view = self.view.as_mut().ok_or(PlannerError::NoMonthLoaded)?;
        let Some(entry) = view.deliveries.iter_mut().find(|d| d.key == key) else {
            return Err(PlannerError::UnknownDelivery(key));
        };
        entry.date = new_date;
        let deliveries = std::mem::take(&mut view.deliveries);

        let annotated = conflict::annotate_holidays(deliveries, &self.calendar).await;
        let mut deliveries = conflict::detect(annotated);
        deliveries.sort_by_key(|d| d.date);

        if let Some(view) = self.view.as_mut() {
            view.deliveries = deliveries;
        }
        info!(key = %key, date = %new_date, "delivery moved in memory");
        self.current_view()
    }

    pub fn summary(&self) -> Option<MonthSummary> {
        self.view.as_ref().map(MonthSummary::of)
    }

    /// Month listing shared by every read of persisted rows. Some deployments
    /// answer an empty month with 404, so `NotFound` means no rows here.
    async fn month_records(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<EntregaRecord>, PersistenceError> {
        match self
            .store
            .list_month(self.agrupamento.id, year, month)
            .await
        {
            Ok(records) => Ok(records),
            Err(PersistenceError::NotFound) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn reload_for(&mut self, fallback: NaiveDate) -> Result<&MonthView, PlannerError> {
        let (year, month) = match &self.view {
            Some(view) => (view.year, view.month),
            None => (fallback.year(), fallback.month()),
        };
        self.load_month(year, month).await
    }

    fn current_view(&self) -> Result<&MonthView, PlannerError> {
        self.view.as_ref().ok_or(PlannerError::NoMonthLoaded)
    }
}

/// Counters for one assembled month, for logs and the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub total: usize,
    pub scheduled: usize,
    pub pending: usize,
    pub conflicted: usize,
    pub holiday_conflicts: usize,
    pub same_day_dates: usize,
    pub suppressed: usize,
}

impl MonthSummary {
    pub fn of(view: &MonthView) -> Self {
        let same_day_dates: BTreeSet<NaiveDate> = view
            .deliveries
            .iter()
            .flat_map(|d| d.conflicts.iter())
            .filter(|c| c.kind == ConflictKind::SameDay)
            .map(|c| c.date)
            .collect();
        Self {
            year: view.year,
            month: view.month,
            total: view.deliveries.len(),
            scheduled: count_status(view, DeliveryStatus::Scheduled),
            pending: count_status(view, DeliveryStatus::Pending),
            conflicted: count_status(view, DeliveryStatus::Conflict),
            holiday_conflicts: view
                .deliveries
                .iter()
                .filter(|d| d.conflicts.iter().any(|c| c.kind == ConflictKind::Holiday))
                .count(),
            same_day_dates: same_day_dates.len(),
            suppressed: view.suppressed.len(),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{:02}/{}: {} deliveries ({} scheduled, {} pending, {} conflicted), \
             {} on holidays, {} crowded dates, {} suppressed",
            self.month,
            self.year,
            self.total,
            self.scheduled,
            self.pending,
            self.conflicted,
            self.holiday_conflicts,
            self.same_day_dates,
            self.suppressed
        )
    }
}

fn count_status(view: &MonthView, status: DeliveryStatus) -> usize {
    view.deliveries
        .iter()
        .filter(|d| d.status == status)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::PeriodicityRule;
    use chrono::Weekday;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn record(id: u64, date: NaiveDate, kind: DeliveryKind) -> EntregaRecord {
        EntregaRecord {
            id,
            data_entrega: date,
            tipo_entrega: kind,
            observacoes: None,
            status: None,
            agrupamento_id: 7,
            agrupamento_nome: None,
            criado_em: None,
            atualizado_em: None,
        }
    }

    fn agrupamento() -> Agrupamento {
        Agrupamento {
            id: 7,
            nome: "Agrupamento Teste".to_string(),
            schools: 5,
            products: 3,
            rule: PeriodicityRule::semanal([Weekday::Tue]),
        }
    }

    #[test]
    fn tombstone_suppresses_the_generated_entry() {
        let generated = vec![
            Delivery::generated(ymd(2025, 6, 10), DeliveryKind::Semanal, 5, 3),
            Delivery::generated(ymd(2025, 6, 17), DeliveryKind::Semanal, 5, 3),
        ];
        let persisted = vec![record(1, ymd(2025, 6, 10), DeliveryKind::Excluida)];
        let outcome = reconcile(generated, &persisted, &agrupamento());

        assert!(outcome.deliveries.iter().all(|d| d.date != ymd(2025, 6, 10)));
        assert_eq!(outcome.deliveries.len(), 1);
        assert_eq!(outcome.suppressed, vec![ymd(2025, 6, 10)]);
    }

    #[test]
    fn tombstone_without_a_match_suppresses_nothing() {
        let generated = vec![Delivery::generated(
            ymd(2025, 6, 17),
            DeliveryKind::Semanal,
            5,
            3,
        )];
        let persisted = vec![record(1, ymd(2025, 6, 10), DeliveryKind::Excluida)];
        let outcome = reconcile(generated, &persisted, &agrupamento());
        assert_eq!(outcome.deliveries.len(), 1);
        assert!(outcome.suppressed.is_empty());
    }

    #[test]
    fn persisted_row_overwrites_the_draft_on_its_date() {
        let generated = vec![Delivery::generated(
            ymd(2025, 6, 10),
            DeliveryKind::Semanal,
            5,
            3,
        )];
        let mut row = record(42, ymd(2025, 6, 10), DeliveryKind::Manual);
        row.observacoes = Some("reagendada pela escola".to_string());
        let outcome = reconcile(generated, &[row], &agrupamento());

        assert_eq!(outcome.deliveries.len(), 1);
        let merged = &outcome.deliveries[0];
        assert_eq!(merged.key, DeliveryKey::Persisted(42));
        assert_eq!(merged.kind, DeliveryKind::Manual);
        assert_eq!(merged.notes.as_deref(), Some("reagendada pela escola"));
        // counts come from the generated side, untouched by the merge
        assert_eq!(merged.schools, 5);
        assert_eq!(merged.products, 3);
    }

    #[test]
    fn persisted_row_without_a_draft_is_appended() {
        let generated = vec![Delivery::generated(
            ymd(2025, 6, 10),
            DeliveryKind::Semanal,
            5,
            3,
        )];
        let persisted = vec![record(42, ymd(2025, 6, 20), DeliveryKind::Manual)];
        let outcome = reconcile(generated, &persisted, &agrupamento());

        assert_eq!(outcome.deliveries.len(), 2);
        assert_eq!(outcome.deliveries[1].key, DeliveryKey::Persisted(42));
        assert_eq!(outcome.deliveries[1].schools, 5);
        assert!(outcome.deliveries.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn two_persisted_rows_on_one_date_coexist() {
        let generated = vec![Delivery::generated(
            ymd(2025, 6, 10),
            DeliveryKind::Semanal,
            5,
            3,
        )];
        let persisted = vec![
            record(41, ymd(2025, 6, 10), DeliveryKind::Manual),
            record(42, ymd(2025, 6, 10), DeliveryKind::Manual),
        ];
        let outcome = reconcile(generated, &persisted, &agrupamento());

        // first row claims the draft slot, second appends alongside it
        assert_eq!(outcome.deliveries.len(), 2);
        let keys: Vec<DeliveryKey> = outcome.deliveries.iter().map(|d| d.key).collect();
        assert!(keys.contains(&DeliveryKey::Persisted(41)));
        assert!(keys.contains(&DeliveryKey::Persisted(42)));
    }

    #[test]
    fn summary_counts_by_status_and_conflict_kind() {
        let mut conflicted = Delivery::generated(ymd(2025, 6, 10), DeliveryKind::Semanal, 1, 1);
        conflicted.conflicts.push(crate::delivery::Conflict {
            date: conflicted.date,
            kind: ConflictKind::Holiday,
            involved: vec![conflicted.key],
            message: "feriado".to_string(),
            holiday: None,
            alternate_date: None,
        });
        conflicted.status = DeliveryStatus::Conflict;
        let view = MonthView {
            year: 2025,
            month: 6,
            deliveries: vec![
                conflicted,
                Delivery::generated(ymd(2025, 6, 17), DeliveryKind::Semanal, 1, 1),
            ],
            suppressed: vec![ymd(2025, 6, 3)],
        };
        let summary = MonthSummary::of(&view);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.scheduled, 1);
        assert_eq!(summary.conflicted, 1);
        assert_eq!(summary.holiday_conflicts, 1);
        assert_eq!(summary.same_day_dates, 0);
        assert_eq!(summary.suppressed, 1);
        assert!(summary.to_line().contains("2 deliveries"));
    }
}
