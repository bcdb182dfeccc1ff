use crate::{
    config::NavigationConfig,
    geo::{format_distance, haversine_m},
    models::{Coordinate, NavigationState, PositionFix, Route},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("cannot navigate a route without steps")]
    EmptyRoute,
    #[error("route step {0} has an invalid coordinate")]
    InvalidStep(usize),
}

#[derive(Debug, Clone)]
struct ActiveRoute {
    route: Route,
    destination: Coordinate,
    current_step_index: usize,
    last_position: Option<Coordinate>,
    distance_to_destination_m: Option<f64>,
}

impl ActiveRoute {
    fn last_index(&self) -> usize {
        self.route.steps.len() - 1
    }

    /// Index used for lookups. Out of range means a bug in the advance logic.
    fn step_index(&self) -> usize {
        debug_assert!(
            self.current_step_index <= self.last_index(),
            "step index {} out of range for {} steps",
            self.current_step_index,
            self.route.steps.len()
        );
        self.current_step_index.min(self.last_index())
    }

    fn snapshot(&self) -> NavigationState {
        let index = self.step_index();
        let remaining_duration_s = self.route.steps[index..]
            .iter()
            .map(|step| step.duration.value)
            .sum();

        NavigationState {
            is_navigating: true,
            current_step_index: index,
            current_step: Some(self.route.steps[index].clone()),
            total_steps: self.route.steps.len(),
            distance_to_destination_text: self.distance_to_destination_m.map(format_distance),
            distance_to_destination_m: self.distance_to_destination_m,
            remaining_duration_s: Some(remaining_duration_s),
            last_position: self.last_position,
        }
    }
}

/// Turns a route plus position fixes into the current step and the
/// distance remaining.
///
/// Synchronous and idle until a route is started; callers feeding it from
/// several sources serialize access through [`crate::session`].
#[derive(Debug, Clone, Default)]
pub struct NavigationTracker {
    config: NavigationConfig,
    active: Option<ActiveRoute>,
}

impl NavigationTracker {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn is_navigating(&self) -> bool {
        self.active.is_some()
    }

    /// Current snapshot; the idle state when no route is loaded.
    pub fn state(&self) -> NavigationState {
        self.active
            .as_ref()
            .map(ActiveRoute::snapshot)
            .unwrap_or_else(NavigationState::idle)
    }

    /// Load `route` and start at its first step.
    ///
    /// Replaces any route already being navigated. An invalid
    /// `initial_position` is not an error; distance fields stay empty until
    /// the first usable fix.
    pub fn start_navigation(
        &mut self,
        route: Route,
        initial_position: Coordinate,
    ) -> Result<NavigationState, NavigationError> {
        validate_route(&route)?;
        let destination = route
            .destination()
            .ok_or(NavigationError::EmptyRoute)?;

        let (last_position, distance_to_destination_m) = if initial_position.is_valid() {
            (
                Some(initial_position),
                Some(haversine_m(initial_position, destination)),
            )
        } else {
            tracing::warn!("ignoring invalid initial position {:?}", initial_position);
            (None, None)
        };

        tracing::info!(
            "navigation started: {} steps, destination {:?}",
            route.steps.len(),
            destination
        );

        let active = ActiveRoute {
            route,
            destination,
            current_step_index: 0,
            last_position,
            distance_to_destination_m,
        };
        let state = active.snapshot();
        self.active = Some(active);
        Ok(state)
    }

    /// Feed one position fix.
    ///
    /// Advances at most one step per call. Invalid fixes, fixes less
    /// accurate than the configured limit, and fixes received while idle
    /// leave the state untouched.
    pub fn on_position_update(&mut self, fix: impl Into<PositionFix>) -> NavigationState {
        let fix = fix.into();
        let threshold = self.config.advance_threshold_m;
        let accepted = self.accepts(&fix);

        let Some(active) = self.active.as_mut() else {
            tracing::debug!("position update while idle ignored");
            return NavigationState::idle();
        };
        if !accepted {
            tracing::warn!(
                "ignored position fix {:?} (accuracy {:?})",
                fix.coord,
                fix.accuracy_m
            );
            return active.snapshot();
        }

        let position = fix.coord;
        let index = active.step_index();
        let step_end = active.route.steps[index].end;
        let distance_to_step_end = haversine_m(position, step_end);

        if distance_to_step_end < threshold && index < active.last_index() {
            active.current_step_index = index + 1;
            tracing::info!(
                "advanced to step {}/{} ({:.1}m from end of step {})",
                active.current_step_index + 1,
                active.route.steps.len(),
                distance_to_step_end,
                index
            );
        }

        let distance_to_destination = haversine_m(position, active.destination);
        active.last_position = Some(position);
        active.distance_to_destination_m = Some(distance_to_destination);

        tracing::debug!(
            "fix {:?}: {:.1}m to step end, {:.1}m to destination",
            position,
            distance_to_step_end,
            distance_to_destination
        );

        active.snapshot()
    }

    /// Whether `fix` is usable: a valid coordinate, and accurate enough
    /// when an accuracy limit is configured. Does not log.
    pub fn accepts(&self, fix: &PositionFix) -> bool {
        if !fix.coord.is_valid() {
            return false;
        }
        match (self.config.max_fix_accuracy_m, fix.accuracy_m) {
            (Some(limit), Some(accuracy)) => !accuracy.is_nan() && accuracy <= limit,
            _ => true,
        }
    }

    /// Return to idle. Calling it while idle is a no-op.
    pub fn stop_navigation(&mut self) -> NavigationState {
        if self.active.take().is_some() {
            tracing::info!("navigation stopped");
        }
        NavigationState::idle()
    }

    /// The user picked another destination; the current route no longer applies.
    pub fn change_destination(&mut self) -> NavigationState {
        if self.active.is_some() {
            tracing::info!("destination changed, dropping current route");
        }
        self.stop_navigation()
    }

    /// On the last step and within the arrival threshold of the destination.
    ///
    /// The tracker itself keeps navigating; deciding what arrival means is
    /// up to the caller.
    pub fn is_arrival(&self, state: &NavigationState) -> bool {
        state.is_last_step()
            && state
                .distance_to_destination_m
                .is_some_and(|distance| distance < self.config.arrival_threshold_m)
    }
}

fn validate_route(route: &Route) -> Result<(), NavigationError> {
    if route.steps.is_empty() {
        return Err(NavigationError::EmptyRoute);
    }
    match route
        .steps
        .iter()
        .position(|step| !step.start.is_valid() || !step.end.is_valid())
    {
        Some(index) => Err(NavigationError::InvalidStep(index)),
        None => Ok(()),
    }
}
