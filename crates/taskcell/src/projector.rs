#![forbid(unsafe_code)]

//! The presentation layer's initialization seam.
//!
//! A [`Projector`] is the generic contract a UI surface implements
//! against a controller and its model. `init` drives the four phases in
//! order. A typical implementation registers exactly one named controller
//! action per event handler and one `on_change` listener per bound
//! widget, converting the cell value into the widget's representation
//! where needed.

/// Generic interface of a presentation surface over model `M` driven by
/// controller `C`.
pub trait Projector<M, C> {
    /// Drive the full initialization protocol. Call once from the UI
    /// surface's constructor.
    fn init(&mut self, controller: &C, model: &M) {
        self.initialize_self();
        self.initialize_parts();
        self.setup_ui_to_action_bindings(controller);
        self.setup_model_to_ui_bindings(model);
    }

    /// Everything the surface needs for itself — loading stylesheets or
    /// attaching fonts are typical examples.
    fn initialize_self(&mut self) {}

    /// Create and configure all UI parts.
    fn initialize_parts(&mut self);

    /// Wire user events to controller actions. Each handler calls a
    /// single named action; a handler that wants two mutations means the
    /// controller wants a new action. No model access needed here.
    fn setup_ui_to_action_bindings(&mut self, controller: &C) {
        let _ = controller;
    }

    /// Register the `on_change` listeners that refresh the surface
    /// whenever a cell transitions. No controller access needed here.
    fn setup_model_to_ui_bindings(&mut self, model: &M) {
        let _ = model;
    }
}
