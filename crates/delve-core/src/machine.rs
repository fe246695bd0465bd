//! Production state machine shared by every machine variant.
//!
//! There is one `Machine` type. Burner, steel and electric furnaces and the
//! drills differ only in the [`MachineKindDef`] they are ticked with.

use crate::fixed::{checked_div_64, Fixed64};
use crate::id::*;
use crate::inventory::MachineInventory;
use crate::registry::{MachineKindDef, MachineRole, Registry};
use crate::timer::Countdown;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What a machine is currently producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// Smelting with a recipe.
    Recipe(RecipeId),
    /// Drilling the ore item under the footprint.
    Drill(ItemId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionState {
    #[default]
    Idle,
    Active { job: Job, timer: Countdown },
}

/// Why an idle machine cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    MissingInputs,
    NoFuel,
    OutputFull,
}

/// The outcome of a single tick for a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineTick {
    /// Went from idle to active this tick.
    pub activated: bool,
    /// Went from active to idle this tick. Set together with `activated`
    /// when a machine starts and runs dry within the same step.
    pub deactivated: bool,
    /// Production cycles completed this tick.
    pub produced: u32,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    kind: MachineKindId,
    inventory: MachineInventory,
    state: ProductionState,
    drill_target: Option<ItemId>,
}

impl Machine {
    /// A new idle machine with the empty inventory of `def`.
    pub fn new(kind: MachineKindId, def: &MachineKindDef) -> Self {
        Self {
            kind,
            inventory: MachineInventory::from_specs(&def.inputs, def.output_capacity),
            state: ProductionState::Idle,
            drill_target: None,
        }
    }

    pub fn kind(&self) -> MachineKindId {
        self.kind
    }

    pub fn inventory(&self) -> &MachineInventory {
        &self.inventory
    }

    /// Direct inventory access. Production picks up the change on the next
    /// tick.
    pub fn inventory_mut(&mut self) -> &mut MachineInventory {
        &mut self.inventory
    }

    pub fn state(&self) -> &ProductionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ProductionState::Active { .. })
    }

    /// Progress of the current cycle in `[0, 1]`; zero when idle.
    pub fn progress(&self) -> Fixed64 {
        match &self.state {
            ProductionState::Active { timer, .. } => timer.progress(),
            ProductionState::Idle => Fixed64::ZERO,
        }
    }

    pub fn drill_target(&self) -> Option<ItemId> {
        self.drill_target
    }

    /// Set the ore item a drill extracts. Ignored by smelters.
    pub fn set_drill_target(&mut self, ore: Option<ItemId>) {
        self.drill_target = ore;
    }

    /// Drop any in-progress cycle. Progress is lost.
    pub fn cancel(&mut self) {
        self.state = ProductionState::Idle;
    }

    /// The job the machine could run right now, if every precondition holds.
    pub fn ready_job(&self, def: &MachineKindDef, registry: &Registry) -> Option<Job> {
        self.evaluate(def, registry).ok()
    }

    /// Why the machine cannot run, or `None` if it can.
    pub fn stall_reason(&self, def: &MachineKindDef, registry: &Registry) -> Option<StallReason> {
        self.evaluate(def, registry).err()
    }

    fn fuel_ready(&self, def: &MachineKindDef) -> bool {
        match def.fuel_slot() {
            Some(slot) => self.inventory.slot(slot).is_some_and(|s| s.amount() >= 1),
            None => true,
        }
    }

    fn evaluate(&self, def: &MachineKindDef, registry: &Registry) -> Result<Job, StallReason> {
        let (job, output, quantity) = match def.role {
            MachineRole::Smelter => {
                let (recipe_id, recipe) = self
                    .smelt_candidate(def, registry)
                    .ok_or(StallReason::MissingInputs)?;
                (Job::Recipe(recipe_id), recipe.output, recipe.output_quantity)
            }
            MachineRole::Drill { .. } => {
                let ore = self.drill_target.ok_or(StallReason::MissingInputs)?;
                (Job::Drill(ore), ore, 1)
            }
        };
        if !self.fuel_ready(def) {
            return Err(StallReason::NoFuel);
        }
        if !self.inventory.output().has_room_for(output, quantity) {
            return Err(StallReason::OutputFull);
        }
        Ok(job)
    }

    /// First non-fuel input slot (declaration order) whose contents satisfy
    /// one of the machine's recipes.
    fn smelt_candidate<'r>(
        &self,
        def: &MachineKindDef,
        registry: &'r Registry,
    ) -> Option<(RecipeId, &'r crate::registry::RecipeDef)> {
        let fuel = def.fuel_slot();
        self.inventory
            .inputs()
            .iter()
            .filter(|named| Some(named.name.as_str()) != fuel)
            .find_map(|named| {
                let item = named.slot.item()?;
                let recipe_id = registry.recipe_for_input(self.kind, item)?;
                let recipe = registry.recipe(recipe_id)?;
                (named.slot.amount() >= recipe.input_quantity).then_some((recipe_id, recipe))
            })
    }

    fn cycle_period(def: &MachineKindDef, registry: &Registry, job: Job) -> Option<Fixed64> {
        let base = match (job, &def.role) {
            (Job::Recipe(r), _) => registry.recipe(r)?.smelt_time,
            (Job::Drill(_), MachineRole::Drill { mine_time }) => *mine_time,
            (Job::Drill(_), MachineRole::Smelter) => return None,
        };
        checked_div_64(base, def.speed)
    }

    /// Consume inputs and fuel for one completed cycle and add the output.
    fn complete_cycle(&mut self, def: &MachineKindDef, registry: &Registry, job: Job) -> bool {
        let (output, quantity) = match job {
            Job::Recipe(recipe_id) => {
                let Some(recipe) = registry.recipe(recipe_id) else {
                    return false;
                };
                let fuel = def.fuel_slot();
                let Some(source) = self.inventory.inputs().iter().find(|named| {
                    Some(named.name.as_str()) != fuel
                        && named.slot.item() == Some(recipe.input)
                        && named.slot.amount() >= recipe.input_quantity
                }) else {
                    return false;
                };
                let source = source.name.clone();
                let _ = self.inventory.extract(&source, recipe.input_quantity);
                (recipe.output, recipe.output_quantity)
            }
            Job::Drill(ore) => (ore, 1),
        };
        if let Some(fuel) = def.fuel_slot() {
            let _ = self.inventory.extract(fuel, 1);
        }
        self.inventory.output_mut().deposit(output, quantity) == quantity
    }

    /// Advance production by `dt` seconds.
    ///
    /// Preconditions are re-evaluated at the start of the tick and after
    /// every completed cycle. Losing one drops the timer immediately. A
    /// change of job restarts the timer and ends processing for this tick.
    pub fn tick(&mut self, def: &MachineKindDef, registry: &Registry, dt: Fixed64) -> MachineTick {
        let mut result = MachineTick::default();

        let wanted = self.ready_job(def, registry);
        match (&self.state, wanted) {
            (ProductionState::Idle, None) => return result,
            (ProductionState::Active { .. }, None) => {
                self.state = ProductionState::Idle;
                result.deactivated = true;
                return result;
            }
            (ProductionState::Active { job, .. }, Some(next)) if *job == next => {}
            (current, Some(next)) => {
                let Some(period) = Self::cycle_period(def, registry, next) else {
                    return result;
                };
                result.activated = matches!(current, ProductionState::Idle);
                self.state = ProductionState::Active {
                    job: next,
                    timer: Countdown::repeating(period),
                };
            }
        }

        let (job, firings) = match &mut self.state {
            ProductionState::Active { job, timer } => (*job, timer.advance(dt)),
            ProductionState::Idle => return result,
        };

        for _ in 0..firings {
            if self.ready_job(def, registry) != Some(job) || !self.complete_cycle(def, registry, job) {
                break;
            }
            result.produced += 1;

            match self.ready_job(def, registry) {
                Some(next) if next == job => {}
                Some(next) => {
                    if let Some(period) = Self::cycle_period(def, registry, next) {
                        self.state = ProductionState::Active {
                            job: next,
                            timer: Countdown::repeating(period),
                        };
                    } else {
                        self.state = ProductionState::Idle;
                        result.deactivated = true;
                    }
                    break;
                }
                None => {
                    self.state = ProductionState::Idle;
                    result.deactivated = true;
                    break;
                }
            }
        }

        result
    }
}
