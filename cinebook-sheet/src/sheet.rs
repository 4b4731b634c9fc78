use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Duration, Utc};
use cinebook_catalog::{validate_layout, PriceSummary, PricingEngine};
use cinebook_core::{
    BookingConfirmation, BookingRequest, BookingRules, BookingService, Clock, CoreResult,
    FoodLine, Notice, Notifier, SeatEventStream, SeatInventory, SeatStatusChannel, SessionStore,
    ShowtimeCatalog,
};
use cinebook_shared::{RoomLayout, SeatId, SeatStatusEvent, SeatType, ShowtimeSelection, TicketQuantities, TicketType};
use futures_util::future::join_all;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SheetError, SheetResult};
use crate::live::{apply_event, EventEffect};
use crate::persistence::{Restored, SessionPersistence};
use crate::seat_map::{render_seat_map, SeatGrid, SeatMapView};
use crate::selection::SelectionState;
use crate::timer::{HoldTimer, TimerPhase};

/// Collaborators the sheet drives
#[derive(Clone)]
pub struct SheetServices {
    pub inventory: Arc<dyn SeatInventory>,
    pub catalog: Arc<dyn ShowtimeCatalog>,
    pub bookings: Arc<dyn BookingService>,
    pub sessions: Arc<dyn SessionStore>,
    pub channel: Arc<dyn SeatStatusChannel>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    /// Held by another session or booked
    Taken,
    /// A previous toggle on the same seat has not finished
    Busy,
    /// The ticket quantity has no room for this seat
    LimitReached,
    /// The hold failed for another reason and was rolled back
    Failed,
    /// The showtime changed while the call was in flight
    Abandoned,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStage {
    Idle,
    Submitting,
    AwaitingPayment(BookingConfirmation),
}

/// Read-only view of the sheet for display and tests
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SheetSnapshot {
    pub showtime_id: Uuid,
    pub selected_seats: Vec<SeatId>,
    pub quantities: TicketQuantities,
    pub food: BTreeMap<Uuid, u32>,
    pub blocked: Vec<SeatId>,
    pub processing: Vec<SeatId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub timer: TimerPhase,
    pub checkout: CheckoutStage,
    pub enough_seats: bool,
    pub price: PriceSummary,
}

struct ActiveShowtime {
    showtime: ShowtimeSelection,
    layout: RoomLayout,
    pricing: PricingEngine,
    selection: SelectionState,
    blocked: HashSet<SeatId>,
    processing: HashSet<SeatId>,
    timer: HoldTimer,
    checkout: CheckoutStage,
    /// Counts applied channel events; `last_event` keeps the latest per seat
    event_seq: u64,
    last_event: HashMap<SeatId, u64>,
}

impl ActiveShowtime {
    fn id(&self) -> Uuid {
        self.showtime.id
    }

    fn is_checking_out(&self) -> bool {
        self.checkout != CheckoutStage::Idle
    }
}

#[derive(Default)]
struct SheetState {
    active: Option<ActiveShowtime>,
    /// Bumped whenever the active showtime changes so late replies can tell
    epoch: u64,
}

/// Aborts the task when dropped
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct SheetTasks {
    listener: Option<TaskGuard>,
    ticker: Option<TaskGuard>,
}

struct SheetInner {
    services: SheetServices,
    rules: BookingRules,
    persistence: SessionPersistence,
    state: tokio::sync::Mutex<SheetState>,
}

/// Seat booking flow for one staff session.
///
/// Owns the live channel subscription and the expiry ticker; both stop when
/// the sheet is closed or dropped. Dropping does not release seats, call
/// [`BookingSheet::close`] for that.
pub struct BookingSheet {
    inner: Arc<SheetInner>,
    tasks: Mutex<SheetTasks>,
}

impl BookingSheet {
    /// Must be called inside a tokio runtime; spawns the expiry ticker
    pub fn open(services: SheetServices, rules: BookingRules) -> Self {
        let persistence = SessionPersistence::new(services.sessions.clone(), services.clock.clone());
        let inner = Arc::new(SheetInner {
            services,
            rules,
            persistence,
            state: tokio::sync::Mutex::new(SheetState::default()),
        });

        let ticker = spawn_ticker(Arc::downgrade(&inner), inner.rules.tick_interval());
        Self {
            inner,
            tasks: Mutex::new(SheetTasks { listener: None, ticker: Some(ticker) }),
        }
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, SheetTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the sheet to a showtime, carrying over a persisted session if any
    pub async fn select_showtime(&self, showtime: ShowtimeSelection) -> SheetResult<()> {
        let inner = &self.inner;

        // 1. Retire the previous showtime
        let (epoch, previous) = {
            let mut state = inner.state.lock().await;
            state.epoch += 1;
            (state.epoch, state.active.take())
        };
        self.tasks().listener = None;

        if let Some(previous) = previous {
            if previous.id() == showtime.id {
                // Re-selecting keeps the holds; restore picks them up again
                debug!("Reloading showtime {}", showtime.id);
            } else {
                info!("Leaving showtime {}", previous.id());
                inner.release_all(previous.id(), previous.selection.seat_ids()).await;
                inner.persistence.clear(previous.id()).await;
            }
        }

        // 2. Layout, menu and prices
        let layout = inner.services.catalog.room_layout(showtime.room_id).await?;
        validate_layout(&layout)?;
        let menu = inner.services.catalog.food_menu().await.unwrap_or_else(|e| {
            warn!("Food menu unavailable: {}", e);
            Vec::new()
        });
        let pricing = PricingEngine::new(&showtime, &menu);

        // 3. Restore the persisted session, re-holding its seats
        let (selection, expires_at) = inner.restore_selection(&showtime, &layout).await;

        // 4. Install
        {
            let mut state = inner.state.lock().await;
            if state.epoch != epoch {
                drop(state);
                debug!("Showtime {} superseded while loading", showtime.id);
                inner.release_all(showtime.id, selection.seat_ids()).await;
                return Ok(());
            }

            let mut timer = HoldTimer::default();
            if let Some(at) = expires_at {
                timer.restore(at);
            }

            let active = ActiveShowtime {
                showtime: showtime.clone(),
                layout,
                pricing,
                selection,
                blocked: HashSet::new(),
                processing: HashSet::new(),
                timer,
                checkout: CheckoutStage::Idle,
                event_seq: 0,
                last_event: HashMap::new(),
            };
            inner.persist(&active).await;
            state.active = Some(active);
        }

        // 5. Live channel, joined before the snapshot so nothing falls in between
        match inner.services.channel.join(showtime.id).await {
            Ok(events) => {
                let state = inner.state.lock().await;
                if state.epoch == epoch {
                    self.tasks().listener = Some(spawn_listener(Arc::downgrade(inner), events));
                }
            }
            Err(e) => warn!("Live seat updates unavailable for {}: {}", showtime.id, e),
        }

        // 6. Snapshot
        if let Err(e) = inner.refresh_blocked().await {
            warn!("Failed to load seat status for {}: {}", showtime.id, e);
        }

        info!("Showtime {} selected", showtime.id);
        Ok(())
    }

    /// Select or deselect a seat. Couple seats always move together with
    /// their partner, resolved from the layout when `paired` is not given.
    pub async fn toggle_seat(&self, seat_id: SeatId, paired: Option<SeatId>) -> SheetResult<ToggleOutcome> {
        let inner = &self.inner;
        let now = inner.services.clock.now();

        // 1. Validate and apply optimistically
        let (epoch, showtime_id, seat_ids, selecting) = {
            let mut state = inner.state.lock().await;
            let epoch = state.epoch;
            let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
            if active.is_checking_out() {
                return Err(SheetError::CheckoutInProgress);
            }

            let seat = active.layout.seat(&seat_id).ok_or(SheetError::UnknownSeat(seat_id))?;
            let ticket = seat.seat_type.ticket_type().ok_or(SheetError::UnknownSeat(seat_id))?;
            let seat_ids = if seat.seat_type == SeatType::Couple {
                let partner = active
                    .layout
                    .partner_of(&seat_id)
                    .ok_or(SheetError::UnknownSeat(seat_id))?
                    .id;
                if let Some(paired) = paired.filter(|p| *p != partner) {
                    return Err(SheetError::UnknownSeat(paired));
                }
                vec![seat_id, partner]
            } else {
                vec![seat_id]
            };

            if seat_ids.iter().any(|id| active.blocked.contains(id)) {
                drop(state);
                inner.services.notifier.notify(Notice::SeatTaken { seat_ids });
                inner.resync().await;
                return Ok(ToggleOutcome::Taken);
            }
            if seat_ids.iter().any(|id| active.processing.contains(id)) {
                return Ok(ToggleOutcome::Busy);
            }

            let selecting = !seat_ids.iter().any(|id| active.selection.contains(id));
            if selecting {
                if !active.selection.can_select(ticket, seat_ids.len() as u32) {
                    return Ok(ToggleOutcome::LimitReached);
                }
                for id in &seat_ids {
                    active.selection.insert(*id, ticket);
                }
                active.timer.arm(now, inner.rules.hold_duration());
            } else {
                for id in &seat_ids {
                    active.selection.remove(id);
                }
                if active.selection.is_empty() {
                    active.timer.disarm();
                }
            }
            active.processing.extend(seat_ids.iter().copied());
            inner.persist(active).await;

            (epoch, active.id(), seat_ids, selecting)
        };

        // 2. Talk to the inventory
        let inventory = &inner.services.inventory;
        if !selecting {
            let results = join_all(seat_ids.iter().map(|id| inventory.release_seat(showtime_id, *id))).await;
            for (id, result) in seat_ids.iter().zip(results) {
                // The seat stays deselected; the server TTL reclaims it
                if let Err(e) = result {
                    warn!("Failed to release seat {}: {}", id, e);
                }
            }

            let mut state = inner.state.lock().await;
            if state.epoch != epoch {
                return Ok(ToggleOutcome::Abandoned);
            }
            if let Some(active) = state.active.as_mut() {
                for id in &seat_ids {
                    active.processing.remove(id);
                }
            }
            return Ok(ToggleOutcome::Deselected);
        }

        let results = join_all(seat_ids.iter().map(|id| inventory.hold_seat(showtime_id, *id))).await;
        let acquired: Vec<SeatId> = seat_ids
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_ok())
            .map(|(id, _)| *id)
            .collect();
        let failure = results.into_iter().find_map(Result::err);

        // 3. Reconcile
        let mut state = inner.state.lock().await;
        if state.epoch != epoch || state.active.is_none() {
            // Reselecting the same showtime may have restored these seats already
            let restored: HashSet<SeatId> = state
                .active
                .as_ref()
                .filter(|active| active.id() == showtime_id)
                .map(|active| active.selection.seat_ids().into_iter().collect())
                .unwrap_or_default();
            drop(state);

            let stale: Vec<SeatId> = acquired.into_iter().filter(|id| !restored.contains(id)).collect();
            debug!("Showtime changed while holding {:?}, letting go of {:?}", seat_ids, stale);
            inner.release_all(showtime_id, stale).await;
            return Ok(ToggleOutcome::Abandoned);
        }
        let Some(active) = state.active.as_mut() else {
            return Ok(ToggleOutcome::Abandoned);
        };
        for id in &seat_ids {
            active.processing.remove(id);
        }

        match failure {
            None if seat_ids.iter().all(|id| active.selection.contains(id)) => {
                debug!("Held {:?} on {}", seat_ids, showtime_id);
                Ok(ToggleOutcome::Selected)
            }
            None => {
                // Dropped by a quantity change or timeout while in flight
                drop(state);
                inner.release_all(showtime_id, acquired).await;
                Ok(ToggleOutcome::Abandoned)
            }
            Some(err) => {
                for id in &seat_ids {
                    active.selection.remove(id);
                }
                if active.selection.is_empty() {
                    active.timer.disarm();
                }
                inner.persist(active).await;
                drop(state);

                inner.release_all(showtime_id, acquired).await;
                let outcome = if err.is_conflict() {
                    inner.services.notifier.notify(Notice::SeatTaken { seat_ids });
                    ToggleOutcome::Taken
                } else {
                    warn!("Hold failed on {}: {}", showtime_id, err);
                    inner.services.notifier.notify(Notice::HoldFailed {
                        seat_ids,
                        reason: err.to_string(),
                    });
                    ToggleOutcome::Failed
                };
                inner.resync().await;
                Ok(outcome)
            }
        }
    }

    /// Change a ticket quantity by `delta`, clamped to the configured range.
    /// Seats the new quantity no longer covers are released, newest first.
    pub async fn update_quantity(&self, ticket: TicketType, delta: i32) -> SheetResult<u32> {
        let inner = &self.inner;
        let (showtime_id, dropped, quantity) = {
            let mut state = inner.state.lock().await;
            let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
            if active.is_checking_out() {
                return Err(SheetError::CheckoutInProgress);
            }

            let dropped = active.selection.update_quantity(
                ticket,
                delta,
                inner.rules.max_tickets_per_type,
                &active.layout,
            );
            if active.selection.is_empty() {
                active.timer.disarm();
            }
            inner.persist(active).await;
            (active.id(), dropped, active.selection.quantities().get(ticket))
        };

        if !dropped.is_empty() {
            info!("Quantity change released {:?}", dropped);
            inner.release_all(showtime_id, dropped).await;
        }
        Ok(quantity)
    }

    pub async fn update_food(&self, food_id: Uuid, delta: i32) -> SheetResult<u32> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
        if active.is_checking_out() {
            return Err(SheetError::CheckoutInProgress);
        }
        if active.pricing.has_menu() && !active.pricing.is_on_menu(&food_id) {
            return Err(SheetError::UnknownFood(food_id));
        }

        let quantity = active.selection.update_food(food_id, delta);
        inner.persist(active).await;
        Ok(quantity)
    }

    pub async fn is_enough_seats(&self) -> bool {
        let state = self.inner.state.lock().await;
        state
            .active
            .as_ref()
            .map(|active| active.selection.is_enough_seats())
            .unwrap_or(false)
    }

    pub async fn price_summary(&self) -> SheetResult<PriceSummary> {
        let state = self.inner.state.lock().await;
        let active = state.active.as_ref().ok_or(SheetError::NoActiveShowtime)?;
        Ok(active
            .pricing
            .summarize(&active.selection.quantities(), active.selection.food()))
    }

    /// Reload held and booked seats from the inventory
    pub async fn refresh_blocked(&self) -> SheetResult<()> {
        self.inner.refresh_blocked().await.map_err(SheetError::from)
    }

    /// Apply one pushed seat event
    pub async fn handle_seat_event(&self, event: SeatStatusEvent) -> EventEffect {
        self.inner.handle_seat_event(event).await
    }

    /// Release everything if the hold ran out. Returns whether it did.
    pub async fn check_expiry(&self) -> bool {
        self.inner.check_expiry().await
    }

    /// Submit the booking. The countdown is paused until payment is
    /// confirmed or abandoned.
    pub async fn checkout(&self) -> SheetResult<BookingConfirmation> {
        let inner = &self.inner;

        // 1. Validate locally, no network on failure
        let (epoch, request) = {
            let mut state = inner.state.lock().await;
            let epoch = state.epoch;
            let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
            if active.is_checking_out() {
                return Err(SheetError::CheckoutInProgress);
            }
            if !active.processing.is_empty() {
                return Err(SheetError::SeatsInFlight);
            }
            if !active.selection.is_enough_seats() {
                return Err(SheetError::NotEnoughSeats);
            }

            let request = BookingRequest {
                showtime_id: active.id(),
                seat_ids: active.selection.seat_ids(),
                quantities: active.selection.quantities(),
                food_drinks: active
                    .selection
                    .food()
                    .iter()
                    .map(|(food_id, quantity)| FoodLine { food_id: *food_id, quantity: *quantity })
                    .collect(),
            };

            active.checkout = CheckoutStage::Submitting;
            active.timer.suspend();
            (epoch, request)
        };

        // 2. Submit
        info!("Submitting booking for {} seats on {}", request.seat_ids.len(), request.showtime_id);
        let result = inner.services.bookings.create_booking(&request).await;

        // 3. Record the outcome
        let mut state = inner.state.lock().await;
        let current = state.epoch == epoch;
        let Some(active) = state.active.as_mut().filter(|_| current) else {
            warn!("Showtime changed during checkout of {}", request.showtime_id);
            return result.map_err(SheetError::from);
        };

        match result {
            Ok(confirmation) => {
                info!("Booking {} awaiting payment", confirmation.id);
                active.checkout = CheckoutStage::AwaitingPayment(confirmation.clone());
                Ok(confirmation)
            }
            Err(err) => {
                active.checkout = CheckoutStage::Idle;
                active.timer.resume();
                drop(state);

                warn!("Booking failed: {}", err);
                inner.services.notifier.notify(Notice::CheckoutFailed { reason: err.to_string() });
                if err.is_conflict() {
                    inner.reclaim_selection().await;
                    inner.resync().await;
                }
                Err(err.into())
            }
        }
    }

    /// Payment went through: the seats are booked and the session is done
    pub async fn confirm_payment(&self) -> SheetResult<BookingConfirmation> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
        let CheckoutStage::AwaitingPayment(confirmation) = active.checkout.clone() else {
            return Err(SheetError::NoPendingPayment);
        };

        active.blocked.extend(active.selection.seat_ids());
        active.selection.clear();
        active.timer.disarm();
        active.checkout = CheckoutStage::Idle;
        inner.persistence.clear(active.id()).await;

        info!("Booking {} paid", confirmation.id);
        Ok(confirmation)
    }

    /// Back out of payment. The original deadline applies again.
    pub async fn abandon_payment(&self) -> SheetResult<()> {
        let mut state = self.inner.state.lock().await;
        let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;
        if !matches!(active.checkout, CheckoutStage::AwaitingPayment(_)) {
            return Err(SheetError::NoPendingPayment);
        }

        active.checkout = CheckoutStage::Idle;
        active.timer.resume();
        info!("Payment abandoned on {}", active.id());
        Ok(())
    }

    /// Drop the selection and every hold but stay on the showtime
    pub async fn reset_session(&self) -> SheetResult<()> {
        let inner = &self.inner;
        let (showtime_id, seat_ids) = {
            let mut state = inner.state.lock().await;
            let active = state.active.as_mut().ok_or(SheetError::NoActiveShowtime)?;

            let seat_ids = active.selection.seat_ids();
            active.selection.clear();
            active.timer.disarm();
            active.checkout = CheckoutStage::Idle;
            inner.persistence.clear(active.id()).await;
            (active.id(), seat_ids)
        };

        info!("Session reset on {}", showtime_id);
        inner.release_all(showtime_id, seat_ids).await;
        Ok(())
    }

    /// Leave the channel, stop the ticker and release held seats.
    /// The persisted record is kept so reopening the showtime restores it.
    pub async fn close(&self) {
        let inner = &self.inner;
        let previous = {
            let mut state = inner.state.lock().await;
            state.epoch += 1;
            state.active.take()
        };
        {
            let mut tasks = self.tasks();
            tasks.listener = None;
            tasks.ticker = None;
        }

        if let Some(previous) = previous {
            info!("Closing sheet on {}", previous.id());
            inner.release_all(previous.id(), previous.selection.seat_ids()).await;
        }
    }

    pub async fn snapshot(&self) -> Option<SheetSnapshot> {
        let now = self.inner.services.clock.now();
        let state = self.inner.state.lock().await;
        let active = state.active.as_ref()?;

        let mut blocked: Vec<SeatId> = active.blocked.iter().copied().collect();
        blocked.sort();
        let mut processing: Vec<SeatId> = active.processing.iter().copied().collect();
        processing.sort();

        Some(SheetSnapshot {
            showtime_id: active.id(),
            selected_seats: active.selection.seat_ids(),
            quantities: active.selection.quantities(),
            food: active.selection.food().clone(),
            blocked,
            processing,
            expires_at: active.timer.expires_at(),
            timer: active.timer.phase(now),
            checkout: active.checkout.clone(),
            enough_seats: active.selection.is_enough_seats(),
            price: active
                .pricing
                .summarize(&active.selection.quantities(), active.selection.food()),
        })
    }

    pub async fn render(&self) -> SheetResult<SeatGrid> {
        let state = self.inner.state.lock().await;
        let active = state.active.as_ref().ok_or(SheetError::NoActiveShowtime)?;

        let selected: HashSet<SeatId> = active.selection.seat_ids().into_iter().collect();
        let disabled: Vec<SeatType> = active
            .selection
            .full_types()
            .into_iter()
            .map(|ticket| ticket.seat_type())
            .collect();

        Ok(render_seat_map(
            &active.layout,
            &SeatMapView {
                selected: &selected,
                blocked: &active.blocked,
                processing: &active.processing,
                disabled: &disabled,
            },
        ))
    }

    /// Time left on the running hold
    pub async fn remaining(&self) -> Option<Duration> {
        let now = self.inner.services.clock.now();
        let state = self.inner.state.lock().await;
        state.active.as_ref()?.timer.remaining(now)
    }
}

impl SheetInner {
    /// Re-hold the seats of a persisted session. Seats that cannot be held
    /// again are left out, and a couple seat whose partner was lost goes too.
    async fn restore_selection(
        &self,
        showtime: &ShowtimeSelection,
        layout: &RoomLayout,
    ) -> (SelectionState, Option<DateTime<Utc>>) {
        let inventory = self.services.inventory.as_ref();

        let record = match self.persistence.restore(showtime.id, inventory).await {
            Restored::Empty => return (SelectionState::default(), None),
            Restored::Expired => {
                self.services.notifier.notify(Notice::PreviousHoldExpired);
                return (SelectionState::default(), None);
            }
            Restored::Valid(record) => record,
        };

        let max = self.rules.max_tickets_per_type;
        let mut quantities = record.quantities;
        for ticket in TicketType::ALL {
            quantities.set(ticket, quantities.get(ticket).min(max));
        }
        let mut selection = SelectionState::new(quantities, record.food_quantities.clone());

        let mut seen = HashSet::new();
        let candidates: Vec<_> = record
            .selected_seats
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| {
                let seat = layout.seat(id);
                if seat.is_none() {
                    warn!("Dropping unknown seat {} from restored session", id);
                }
                seat
            })
            .collect();

        let results = join_all(candidates.iter().map(|seat| inventory.hold_seat(showtime.id, seat.id))).await;
        let mut held = HashSet::new();
        for (seat, result) in candidates.iter().zip(results) {
            match result {
                Ok(()) => {
                    held.insert(seat.id);
                }
                Err(e) => warn!("Could not re-hold {} on {}: {}", seat.label, showtime.id, e),
            }
        }

        let mut orphans = Vec::new();
        for seat in &candidates {
            if !held.contains(&seat.id) {
                continue;
            }
            if seat.seat_type == SeatType::Couple {
                let partner_held = layout
                    .partner_of(&seat.id)
                    .map(|partner| held.contains(&partner.id))
                    .unwrap_or(false);
                if !partner_held {
                    orphans.push(seat.id);
                    continue;
                }
            }
            if let Some(ticket) = seat.seat_type.ticket_type() {
                selection.insert(seat.id, ticket);
            }
        }

        for ticket in TicketType::ALL {
            orphans.extend(selection.trim_to_capacity(ticket, layout));
        }
        if !orphans.is_empty() {
            self.release_all(showtime.id, orphans).await;
        }

        info!(
            "Restored {} of {} seats on {}",
            selection.seat_ids().len(),
            record.selected_seats.len(),
            showtime.id
        );

        let expires_at = if selection.is_empty() {
            None
        } else {
            Some(
                record
                    .expires_at
                    .unwrap_or_else(|| self.services.clock.now() + self.rules.hold_duration()),
            )
        };
        (selection, expires_at)
    }

    async fn persist(&self, active: &ActiveShowtime) {
        if active.selection.is_blank() {
            self.persistence.clear(active.id()).await;
            return;
        }
        let record = active
            .selection
            .to_record(active.timer.expires_at(), self.services.clock.now());
        self.persistence.save(active.id(), &record).await;
    }

    /// Best-effort bulk release; failures are logged only
    async fn release_all(&self, showtime_id: Uuid, seat_ids: Vec<SeatId>) {
        if seat_ids.is_empty() {
            return;
        }
        let inventory = &self.services.inventory;
        let results = join_all(seat_ids.iter().map(|id| inventory.release_seat(showtime_id, *id))).await;
        for (id, result) in seat_ids.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to release seat {} on {}: {}", id, showtime_id, e);
            }
        }
    }

    /// Replace the blocked set with a fresh snapshot. Seats a channel event
    /// touched while the snapshot was in flight keep the event's verdict.
    async fn refresh_blocked(&self) -> CoreResult<()> {
        let (epoch, showtime_id, since) = {
            let state = self.state.lock().await;
            match state.active.as_ref() {
                Some(active) => (state.epoch, active.id(), active.event_seq),
                None => return Ok(()),
            }
        };

        let inventory = &self.services.inventory;
        let (held, booked) = futures_util::try_join!(
            inventory.list_held_seats(showtime_id),
            inventory.list_booked_seats(showtime_id)
        )?;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return Ok(());
        }
        if let Some(active) = state.active.as_mut() {
            let newer = |id: &SeatId| active.last_event.get(id).is_some_and(|seq| *seq > since);

            let mut blocked: HashSet<SeatId> = held
                .into_iter()
                .chain(booked)
                .filter(|id| !active.selection.contains(id) && !active.processing.contains(id))
                .filter(|id| !newer(id))
                .collect();
            blocked.extend(active.blocked.iter().copied().filter(|id| newer(id)));

            active.blocked = blocked;
            debug!("{} seats blocked on {}", active.blocked.len(), showtime_id);
        }
        Ok(())
    }

    /// A booking was refused because a seat changed hands. Re-hold the
    /// selection to find which seats were lost, drop them (with the other
    /// half of a couple pair) and tell the user.
    async fn reclaim_selection(&self) {
        let (epoch, showtime_id, seat_ids) = {
            let state = self.state.lock().await;
            let Some(active) = state.active.as_ref() else {
                return;
            };
            (state.epoch, active.id(), active.selection.seat_ids())
        };

        let inventory = &self.services.inventory;
        let results = join_all(seat_ids.iter().map(|id| inventory.hold_seat(showtime_id, *id))).await;
        let lost: Vec<SeatId> = seat_ids
            .iter()
            .zip(&results)
            .filter(|(_, result)| matches!(result, Err(e) if e.is_conflict()))
            .map(|(id, _)| *id)
            .collect();
        if lost.is_empty() {
            return;
        }

        let orphans = {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                return;
            }
            let Some(active) = state.active.as_mut() else {
                return;
            };

            let mut orphans = Vec::new();
            for id in &lost {
                active.selection.remove(id);
                if let Some(partner) = active.layout.partner_of(id) {
                    if !lost.contains(&partner.id) && active.selection.remove(&partner.id) {
                        orphans.push(partner.id);
                    }
                }
            }
            if active.selection.is_empty() {
                active.timer.disarm();
            }
            self.persist(active).await;
            orphans
        };

        warn!("Lost seats {:?} on {}", lost, showtime_id);
        self.release_all(showtime_id, orphans).await;
        self.services.notifier.notify(Notice::SeatTaken { seat_ids: lost });
    }

    /// Re-sync after a conflict; failures only cost freshness
    async fn resync(&self) {
        if let Err(e) = self.refresh_blocked().await {
            warn!("Failed to re-sync seat status: {}", e);
        }
    }

    async fn handle_seat_event(&self, event: SeatStatusEvent) -> EventEffect {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return EventEffect::Ignored;
        };

        let effect = apply_event(Some(active.id()), &active.selection, &mut active.blocked, &event);
        if matches!(effect, EventEffect::Blocked | EventEffect::Unblocked) {
            active.event_seq += 1;
            active.last_event.insert(event.seat_id, active.event_seq);
        }
        debug!("Seat {} {:?} -> {:?}", event.seat_id, event.status, effect);
        effect
    }

    async fn check_expiry(&self) -> bool {
        let now = self.services.clock.now();
        let (showtime_id, seat_ids) = {
            let mut state = self.state.lock().await;
            let Some(active) = state.active.as_mut() else {
                return false;
            };
            if active.timer.phase(now) != TimerPhase::Expired {
                return false;
            }

            let seat_ids = active.selection.seat_ids();
            active.selection.clear();
            active.timer.disarm();
            self.persistence.clear(active.id()).await;
            (active.id(), seat_ids)
        };

        info!("Hold on {} expired, releasing {} seats", showtime_id, seat_ids.len());
        self.release_all(showtime_id, seat_ids).await;
        self.services.notifier.notify(Notice::HoldExpired);
        true
    }
}

fn spawn_listener(inner: Weak<SheetInner>, mut events: SeatEventStream) -> TaskGuard {
    TaskGuard(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_seat_event(event).await;
        }
        debug!("Seat channel closed");
    }))
}

fn spawn_ticker(inner: Weak<SheetInner>, period: std::time::Duration) -> TaskGuard {
    TaskGuard(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.check_expiry().await;
        }
    }))
}
