//! Typed reactive cells.
//!
//! A [`Variable`] is created from a [`VariableSpec`] when its node is built.
//! It fixes the value type, the behaviour flags and the arrival
//! hook; the graph owns everything else (identity, links, current value).
//!
//! ```text
//! state_holding  self_updating  typical role
//! -------------  -------------  -------------------------------------
//!      yes            no        input with default fallback
//!      no             yes       pure output (emits, never read back)
//!      yes            yes       latched internal state / compared output
//!      no             no        event input (fan-in of notifications)
//! ```

use crate::graph::id::{LinkId, NodeId, VarId};
use crate::graph::message::Message;
use crate::graph::restriction::Restriction;
use crate::graph::value::{Value, ValueType};

/// What happens when a value arrives at a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalHook {
    /// Assign and propagate. Nothing else reacts.
    Assign,
    /// Assign and propagate, then notify the owning node's behaviour.
    Owner,
}

/// Construction-time description of a variable.
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub value_type: ValueType,
    pub state_holding: bool,
    pub self_updating: bool,
    pub default: Option<Value>,
    pub restriction: Option<Restriction>,
    pub max_inbound: u32,
    pub hook: ArrivalHook,
    pub publish: bool,
}

impl VariableSpec {
    /// Externally driven, state-holding input with at most one driver.
    pub fn input(value_type: ValueType) -> Self {
        Self {
            value_type,
            state_holding: true,
            self_updating: false,
            default: None,
            restriction: None,
            max_inbound: 1,
            hook: ArrivalHook::Assign,
            publish: false,
        }
    }

    /// Pure output: emits on its owner's behalf, holds no readable state.
    pub fn output(value_type: ValueType) -> Self {
        Self {
            value_type,
            state_holding: false,
            self_updating: true,
            default: None,
            restriction: None,
            max_inbound: 0,
            hook: ArrivalHook::Assign,
            publish: false,
        }
    }

    /// Output that keeps its last value, so repeated equal results are not re-emitted.
    pub fn latched(value_type: ValueType) -> Self {
        Self {
            state_holding: true,
            ..Self::output(value_type)
        }
    }

    /// Stateless notification input that accepts any number of drivers.
    pub fn event(value_type: ValueType) -> Self {
        Self {
            value_type,
            state_holding: false,
            self_updating: false,
            default: None,
            restriction: None,
            max_inbound: u32::MAX,
            hook: ArrivalHook::Owner,
            publish: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    pub fn with_max_inbound(mut self, max: u32) -> Self {
        self.max_inbound = max;
        self
    }

    /// Route arrivals to the owning node's behaviour.
    pub fn watched(mut self) -> Self {
        self.hook = ArrivalHook::Owner;
        self
    }

    /// Forward every emission to the outbound sink.
    pub fn published(mut self) -> Self {
        self.publish = true;
        self
    }
}

/// A registered variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VarId,
    pub(crate) owner: NodeId,
    pub(crate) name: String,
    pub(crate) short_name: String,
    pub(crate) value_type: ValueType,
    pub(crate) state_holding: bool,
    pub(crate) self_updating: bool,
    pub(crate) value: Option<Value>,
    pub(crate) default: Option<Value>,
    pub(crate) restriction: Option<Restriction>,
    pub(crate) links: Vec<LinkId>,
    pub(crate) inbound: u32,
    pub(crate) max_inbound: u32,
    pub(crate) hook: ArrivalHook,
    pub(crate) publish: bool,
}

impl Variable {
    pub(crate) fn from_spec(
        id: VarId,
        owner: NodeId,
        name: String,
        short_name: String,
        spec: VariableSpec,
    ) -> Self {
        Self {
            id,
            owner,
            name,
            short_name,
            value_type: spec.value_type,
            state_holding: spec.state_holding,
            self_updating: spec.self_updating,
            value: None,
            default: spec.default,
            restriction: spec.restriction,
            links: Vec::new(),
            inbound: 0,
            max_inbound: spec.max_inbound,
            hook: spec.hook,
            publish: spec.publish,
        }
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Full dotted name, e.g. `"adder.Input1"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last segment of the name, e.g. `"Input1"`.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_state_holding(&self) -> bool {
        self.state_holding
    }

    pub fn is_self_updating(&self) -> bool {
        self.self_updating
    }

    /// Stored value. Always `None` for non-state-holding variables.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn restriction(&self) -> Option<&Restriction> {
        self.restriction.as_ref()
    }

    /// Outbound links in registration order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn inbound_count(&self) -> u32 {
        self.inbound
    }

    pub fn max_inbound(&self) -> u32 {
        self.max_inbound
    }

    pub fn hook(&self) -> ArrivalHook {
        self.hook
    }

    pub fn is_published(&self) -> bool {
        self.publish
    }

    /// Whether `value` passes the attached restriction, if any.
    pub fn accepts(&self, value: &Value) -> bool {
        self.restriction.as_ref().map_or(true, |r| r.valid(value))
    }

    /// Decode a message for this variable.
    ///
    /// Wrong field cardinality or unparsable text is logged and yields `None`.
    pub fn extract_data(&self, message: &Message) -> Option<Value> {
        match message.decode_scalar(self.value_type) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Dropping message for '{}': {}", self.name, e);
                None
            }
        }
    }

    /// Encode the stored value. `None` if nothing has been assigned yet.
    pub fn create_message(&self) -> Option<Message> {
        self.value.as_ref().map(Message::scalar)
    }
}
