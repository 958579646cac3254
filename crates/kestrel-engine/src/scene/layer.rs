use super::{ActorKey, ComponentKey, ZIndex};

/// Group of root actors drawn together, once per camera attached inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    order: ZIndex,
    hidden: bool,
    pub(crate) roots: Vec<ActorKey>,
    pub(crate) cameras: Vec<ComponentKey>,
}

impl Layer {
    pub(crate) fn new(name: impl Into<String>, order: ZIndex) -> Self {
        Self {
            name: name.into(),
            order,
            hidden: false,
            roots: Vec::new(),
            cameras: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> ZIndex {
        self.order
    }

    pub fn set_order(&mut self, order: ZIndex) {
        self.order = order;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn roots(&self) -> &[ActorKey] {
        &self.roots
    }

    /// Camera components attached to actors of this layer, in attach order.
    pub fn cameras(&self) -> &[ComponentKey] {
        &self.cameras
    }
}
