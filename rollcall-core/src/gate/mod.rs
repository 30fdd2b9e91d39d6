//! View gating
//!
//! Binds a presentation element to a [`Requirement`] and keeps it hidden,
//! disabled or detached while the requirement is denied. The element is
//! abstracted behind [`ViewElement`] so any retained-mode UI can plug in;
//! [`memory::MemoryTree`] is a headless implementation.
//!
//! Applying the same decision twice is a no-op: the original display value
//! and disabled state are captured once, and at most one placeholder marker
//! exists per gated element. Releasing the gate restores the element.

pub mod memory;

use crate::access::AccessControl;
use crate::rbac::Requirement;
use crate::reactive::Subscription;
use std::sync::{Arc, Mutex, PoisonError};

/// Display value used to hide an element
pub const HIDDEN: &str = "none";
/// Accessibility attribute set while disabled
pub const ARIA_DISABLED: &str = "aria-disabled";

/// Operations a gated element must support
pub trait ViewElement: Send + 'static {
    /// Placeholder left in the tree while the element is detached
    type Marker: Send + 'static;

    fn display(&self) -> String;
    fn set_display(&mut self, value: &str);
    fn is_disabled(&self) -> bool;
    fn set_disabled(&mut self, disabled: bool);
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&mut self, name: &str, value: Option<&str>);
    fn has_class(&self, class: &str) -> bool;
    fn set_class(&mut self, class: &str, present: bool);
    /// Take the element out of its parent, leaving a marker in its place.
    /// `None` when the element has no parent.
    fn detach(&mut self) -> Option<Self::Marker>;
    /// Put the element back where `marker` stands
    fn reattach(&mut self, marker: Self::Marker);
}

/// What happens to a denied element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GateMode {
    #[default]
    Hide,
    Disable,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOptions {
    pub requirement: Requirement,
    pub mode: GateMode,
    /// Class toggled on while disabled (`Disable` mode only)
    pub disabled_class: Option<String>,
}

impl GateOptions {
    pub fn new(requirement: Requirement) -> Self {
        Self { requirement, mode: GateMode::Hide, disabled_class: None }
    }

    pub fn hide(mut self) -> Self {
        self.mode = GateMode::Hide;
        self
    }

    pub fn disable(mut self) -> Self {
        self.mode = GateMode::Disable;
        self
    }

    pub fn remove(mut self) -> Self {
        self.mode = GateMode::Remove;
        self
    }

    pub fn with_disabled_class(mut self, class: impl Into<String>) -> Self {
        self.disabled_class = Some(class.into());
        self
    }
}

struct GateState<E: ViewElement> {
    element: E,
    mode: GateMode,
    disabled_class: Option<String>,
    saved_display: Option<String>,
    saved_disabled: Option<SavedDisabled>,
    marker: Option<E::Marker>,
}

/// Element state overwritten by `Disable` mode
struct SavedDisabled {
    disabled: bool,
    aria: Option<String>,
    had_class: bool,
}

impl<E: ViewElement> GateState<E> {
    fn apply(&mut self, allowed: bool) {
        if allowed {
            self.restore();
            return;
        }
        match self.mode {
            GateMode::Hide => {
                if self.saved_display.is_none() {
                    self.saved_display = Some(self.element.display());
                    self.element.set_display(HIDDEN);
                }
            }
            GateMode::Disable => {
                if self.saved_disabled.is_none() {
                    self.saved_disabled = Some(SavedDisabled {
                        disabled: self.element.is_disabled(),
                        aria: self.element.attribute(ARIA_DISABLED),
                        had_class: self.disabled_class.as_deref().is_some_and(|c| self.element.has_class(c)),
                    });
                    self.element.set_disabled(true);
                    self.element.set_attribute(ARIA_DISABLED, Some("true"));
                    if let Some(class) = &self.disabled_class {
                        self.element.set_class(class, true);
                    }
                }
            }
            GateMode::Remove => {
                if self.marker.is_none() {
                    self.marker = self.element.detach();
                    if self.marker.is_none() {
                        log::debug!("Gated element has no parent, nothing to remove");
                    }
                }
            }
        }
    }

    /// Undo every effect this gate applied
    fn restore(&mut self) {
        if let Some(display) = self.saved_display.take() {
            self.element.set_display(&display);
        }
        if let Some(saved) = self.saved_disabled.take() {
            self.element.set_disabled(saved.disabled);
            self.element.set_attribute(ARIA_DISABLED, saved.aria.as_deref());
            if let Some(class) = &self.disabled_class {
                self.element.set_class(class, saved.had_class);
            }
        }
        if let Some(marker) = self.marker.take() {
            self.element.reattach(marker);
        }
    }
}

/// An element bound to a requirement
///
/// The element follows every decision change until the gate is released or
/// dropped, at which point it is restored.
pub struct ViewGate<E: ViewElement> {
    access: AccessControl,
    requirement: Requirement,
    state: Arc<Mutex<GateState<E>>>,
    subscription: Option<Subscription>,
}

impl<E: ViewElement> ViewGate<E> {
    /// Bind `element` and apply the current decision immediately
    pub fn attach(access: &AccessControl, element: E, options: GateOptions) -> Self {
        let state = Arc::new(Mutex::new(GateState {
            element,
            mode: options.mode,
            disabled_class: options.disabled_class,
            saved_display: None,
            saved_disabled: None,
            marker: None,
        }));
        let mut gate = Self { access: access.clone(), requirement: options.requirement, state, subscription: None };
        gate.subscribe();
        gate
    }

    /// Change requirement, mode or class
    ///
    /// Effects of the previous mode are undone before the new options apply.
    pub fn update(&mut self, options: GateOptions) {
        self.subscription.take();
        {
            let mut state = self.lock();
            if state.mode != options.mode || state.disabled_class != options.disabled_class {
                state.restore();
            }
            state.mode = options.mode;
            state.disabled_class = options.disabled_class;
        }
        self.requirement = options.requirement;
        self.subscribe();
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn mode(&self) -> GateMode {
        self.lock().mode
    }

    /// Whether a denial is currently applied
    pub fn is_gated(&self) -> bool {
        let state = self.lock();
        state.saved_display.is_some() || state.saved_disabled.is_some() || state.marker.is_some()
    }

    /// Stop following decisions and restore the element
    pub fn release(mut self) {
        self.teardown();
    }

    fn subscribe(&mut self) {
        let requirement = self.requirement.clone();
        let state = Arc::clone(&self.state);
        let subscription = self.access.watch(
            move |ev| ev.authorize(&requirement).allowed,
            move |allowed: &bool| {
                state.lock().unwrap_or_else(PoisonError::into_inner).apply(*allowed);
            },
        );
        self.subscription = Some(subscription);
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            self.lock().restore();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: ViewElement> Drop for ViewGate<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
