//! Event dispatch between the assembly walk and the rules.
//!
//! Rules never walk the assembly themselves. They subscribe to [`EventKind`]s and the
//! [`Dispatcher`] visits every type, field, method and instruction exactly once, calling each
//! subscriber in registration order. After the walk, rules subscribed to
//! [`EventKind::CallGraph`] get the completed [`crate::analysis::CallGraph`].
//!
//! # Key Components
//!
//! - [`Rule`] - the rule contract, with explicit per-method state
//! - [`Subscriptions`] - event kinds a rule asked for
//! - [`RuleContext`] - reporting and configuration access inside callbacks
//! - [`MethodView`] - decoded body, regions and stack tracker of the current method
//! - [`Dispatcher`] - the walk itself, with per-rule failure isolation
//!
//! # Examples
//!
//! ```rust
//! use dotlint::dispatch::{Event, EventKind, Rule, RuleContext, RuleInfo, Subscriptions};
//! use dotlint::report::Severity;
//! use dotlint::Result;
//!
//! static INFO: RuleInfo = RuleInfo {
//!     check_id: "X0001",
//!     name: "EmptyType",
//!     severity: Severity::Nitpick,
//!     category: "Design",
//!     min_runtime: None,
//!     description: "Types without members",
//! };
//!
//! struct EmptyType;
//!
//! impl Rule for EmptyType {
//!     type MethodState = ();
//!
//!     fn info(&self) -> &'static RuleInfo {
//!         &INFO
//!     }
//!
//!     fn register(&self, events: &mut Subscriptions) {
//!         events.on(EventKind::BeginType);
//!     }
//!
//!     fn visit(&mut self, event: &Event<'_>, cx: &mut RuleContext<'_>) -> Result<()> {
//!         if let Event::BeginType(ty) = event {
//!             if ty.fields.is_empty() && ty.methods.is_empty() {
//!                 cx.report_type(ty, "type has no members");
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//! ```

mod dispatcher;
mod event;
mod rule;
mod view;

pub use dispatcher::{Dispatcher, RULE_FAILED_CHECK_ID};
pub use event::{Event, EventKind};
pub use rule::{boxed, DynRule, Rule, RuleContext, RuleInfo, Subscriptions};
pub use view::MethodView;
