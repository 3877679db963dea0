// SPDX-FileCopyrightText: 2024 quire developers
// SPDX-License-Identifier: Apache-2.0 or MIT

//! The interpreter seam.
//!
//! The layout core does not parse or evaluate the scripting language itself; it talks to an
//! implementation of the [`Interpreter`][] trait.  The interpreter runs hook callbacks for each
//! [`Phase`][] of a layout pass, evaluates [`ScriptCall`][]s into [`Value`][]s, maintains the
//! style and block-context stacks, and owns the map from tree nodes to the layout objects they
//! produced.
//!
//! [`Scripting`][] is the implementation used by [`Document`][] and the tests: hooks are boxed
//! closures registered per phase, and script calls carry their evaluation as a closure.  A full
//! scripting language front end can provide its own implementation of the trait instead.
//!
//! [`Interpreter`]: trait.Interpreter.html
//! [`Phase`]: enum.Phase.html
//! [`ScriptCall`]: struct.ScriptCall.html
//! [`Value`]: enum.Value.html
//! [`Scripting`]: struct.Scripting.html
//! [`Document`]: ../struct.Document.html

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, ErrorKind, Location};
use crate::layout::{AbsolutePagePos, LayoutId};
use crate::style::Style;
use crate::tree::{BlockNode, InlineNode, NodeId};
use crate::{DocumentSettings, DynLength, Size};

/// A phase of the layout pipeline.
///
/// Hook callbacks are registered per phase; all callbacks of one phase complete before the next
/// phase begins.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// Runs once before the first pass and fills the document settings.
    Preamble,
    /// Runs at the start of every pass, before the layout tree is built.
    Layout,
    /// Runs after the layout tree is built, before positions are computed.
    Position,
    /// Runs after positions are computed.
    PostLayout,
    /// Runs once after the last pass has converged.
    Finalise,
}

/// The observable global state of a layout run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlobalState {
    /// The one-based number of the current layout pass.
    pub layout_pass: usize,
    /// The number of pages the previous pass produced.
    pub page_count: usize,
    /// The paper size.
    pub page_size: Size,
}

/// A value produced by evaluating a script expression.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Value {
    /// No value.
    Void,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A character.
    Char(char),
    /// A string.
    Str(String),
    /// A length with a unit.
    Length(DynLength),
    /// An array of values.
    Array(Vec<Value>),
    /// An optional value.
    Optional(Option<Box<Value>>),
    /// An inline tree object.
    Inline(InlineNode),
    /// A block tree object.
    Block(BlockNode),
    /// A reference to an inline tree object.
    InlineRef(NodeId),
    /// A reference to a block tree object.
    BlockRef(NodeId),
    /// A reference to a layout object.
    LayoutRef(LayoutId),
}

type ExprFn = dyn Fn(&mut dyn Interpreter) -> Result<Value, Error>;

/// An unevaluated script expression.
///
/// The expression language itself is out of scope here; an expression is an opaque callable that
/// the interpreter invokes.
#[derive(Clone)]
pub struct Expr(Rc<ExprFn>);

impl Expr {
    /// Creates an expression from a closure.
    pub fn new(f: impl Fn(&mut dyn Interpreter) -> Result<Value, Error> + 'static) -> Expr {
        Expr(Rc::new(f))
    }

    /// Creates an expression that yields a constant value.
    pub fn constant(value: Value) -> Expr {
        Expr::new(move |_| Ok(value.clone()))
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Expr")
    }
}

/// A script call embedded in the document tree.
#[derive(Clone, Debug)]
pub struct ScriptCall {
    /// The expression to evaluate.
    pub call: Expr,
    /// The source location of the call, for diagnostics.
    pub location: Option<Location>,
}

impl ScriptCall {
    /// Creates a script call from an expression.
    pub fn new(call: Expr) -> ScriptCall {
        ScriptCall {
            call,
            location: None,
        }
    }

    /// Creates a script call with a source location.
    pub fn with_location(call: Expr, location: Location) -> ScriptCall {
        ScriptCall {
            call,
            location: Some(location),
        }
    }
}

/// The operations the layout core invokes on its scripting collaborator.
///
/// Style and block-context pushes must be strictly nested; the layout engine pairs every push
/// with a pop.
pub trait Interpreter {
    /// Runs the registered hook callbacks for the given phase, in registration order.
    fn run_hooks(&mut self, phase: Phase) -> Result<(), Error>;

    /// Evaluates the given expression.
    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Error>;

    /// Returns the document settings collected during the preamble phase.
    fn document_settings(&self) -> DocumentSettings;

    /// Returns the top of the style stack, or the empty style.
    fn current_style(&self) -> Style;

    /// Pushes a style onto the style stack.
    fn push_style(&mut self, style: Style);

    /// Pops the top of the style stack.
    fn pop_style(&mut self) -> Style;

    /// Pushes a block context (the block object whose children are being processed).
    fn push_block_context(&mut self, block: Option<BlockNode>);

    /// Pops the innermost block context.
    fn pop_block_context(&mut self);

    /// Returns the innermost block context.
    fn block_context(&self) -> Option<BlockNode>;

    /// Requests another layout pass.
    fn request_layout(&mut self);

    /// Returns whether another layout pass has been requested during the current pass.
    fn layout_requested(&self) -> bool;

    /// Starts a new pass: updates the observable state and clears the per-pass bookkeeping.
    fn begin_pass(&mut self, state: GlobalState);

    /// Returns the observable global state.
    fn state(&self) -> GlobalState;

    /// Queues a block object for placement at a fixed page position.
    fn add_absolutely_positioned_block(&mut self, block: BlockNode, pos: AbsolutePagePos);

    /// Takes the queued absolutely-positioned blocks.
    fn take_positioned_blocks(&mut self) -> Vec<(BlockNode, AbsolutePagePos)>;

    /// Records that the given tree node produced the given layout object.
    fn record_layout_object(&mut self, node: NodeId, object: LayoutId);

    /// Returns the layout objects the given tree node produced during the current pass.
    fn layout_objects_for(&self, node: NodeId) -> Vec<LayoutId>;
}

type Hook = Box<dyn FnMut(&mut Scripting) -> Result<(), Error>>;

/// A self-contained [`Interpreter`](trait.Interpreter.html) implementation.
///
/// Hooks are closures registered per phase with [`on`](#method.on); script expressions carry
/// their own evaluation closures.  This is not a language front end, but it provides everything
/// the layout pipeline needs, including the document settings collected by preamble hooks.
#[derive(Default)]
pub struct Scripting {
    settings: DocumentSettings,
    hooks: Vec<(Phase, Hook)>,
    style_stack: Vec<Style>,
    block_stack: Vec<Option<BlockNode>>,
    state: GlobalState,
    relayout: bool,
    positioned: Vec<(BlockNode, AbsolutePagePos)>,
    generated: HashMap<NodeId, Vec<LayoutId>>,
}

impl Scripting {
    /// Creates a new scripting state.
    pub fn new() -> Scripting {
        Scripting::default()
    }

    /// Registers a hook callback for the given phase.
    ///
    /// Callbacks run in registration order when the phase's hooks are run.
    pub fn on(
        &mut self,
        phase: Phase,
        hook: impl FnMut(&mut Scripting) -> Result<(), Error> + 'static,
    ) {
        self.hooks.push((phase, Box::new(hook)));
    }

    /// Returns a mutable reference to the document settings.
    ///
    /// Preamble hooks use this to fill in the settings.
    pub fn settings_mut(&mut self) -> &mut DocumentSettings {
        &mut self.settings
    }
}

impl fmt::Debug for Scripting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scripting")
            .field("hooks", &self.hooks.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Interpreter for Scripting {
    fn run_hooks(&mut self, phase: Phase) -> Result<(), Error> {
        // hooks receive &mut self, so they are taken out for the duration of the phase;
        // hooks registered by a running hook only fire from the next phase on
        let mut hooks = std::mem::take(&mut self.hooks);
        let mut result = Ok(());
        for (hook_phase, hook) in &mut hooks {
            if *hook_phase == phase {
                result = hook(self);
                if result.is_err() {
                    break;
                }
            }
        }
        hooks.append(&mut self.hooks);
        self.hooks = hooks;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Error> {
        let f = Rc::clone(&expr.0);
        f(self)
    }

    fn document_settings(&self) -> DocumentSettings {
        self.settings.clone()
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_else(Style::empty)
    }

    fn push_style(&mut self, style: Style) {
        self.style_stack.push(style);
    }

    fn pop_style(&mut self) -> Style {
        match self.style_stack.pop() {
            Some(style) => style,
            None => {
                log::warn!("style stack underflow");
                Style::empty()
            }
        }
    }

    fn push_block_context(&mut self, block: Option<BlockNode>) {
        self.block_stack.push(block);
    }

    fn pop_block_context(&mut self) {
        self.block_stack.pop();
    }

    fn block_context(&self) -> Option<BlockNode> {
        self.block_stack.last().cloned().flatten()
    }

    fn request_layout(&mut self) {
        self.relayout = true;
    }

    fn layout_requested(&self) -> bool {
        self.relayout
    }

    fn begin_pass(&mut self, state: GlobalState) {
        self.state = state;
        self.relayout = false;
        self.generated.clear();
        self.positioned.clear();
    }

    fn state(&self) -> GlobalState {
        self.state
    }

    fn add_absolutely_positioned_block(&mut self, block: BlockNode, pos: AbsolutePagePos) {
        self.positioned.push((block, pos));
    }

    fn take_positioned_blocks(&mut self) -> Vec<(BlockNode, AbsolutePagePos)> {
        std::mem::take(&mut self.positioned)
    }

    fn record_layout_object(&mut self, node: NodeId, object: LayoutId) {
        self.generated.entry(node).or_default().push(object);
    }

    fn layout_objects_for(&self, node: NodeId) -> Vec<LayoutId> {
        self.generated.get(&node).cloned().unwrap_or_default()
    }
}

/// Converts a value into inline content, the way paragraphs consume script results.
pub fn value_to_inline(value: Value) -> Result<Option<InlineNode>, Error> {
    match value {
        Value::Void => Ok(None),
        Value::Optional(None) => Ok(None),
        Value::Optional(Some(inner)) => value_to_inline(*inner),
        Value::Inline(node) => Ok(Some(node)),
        Value::Str(s) => Ok(Some(crate::tree::InlineObject::text(s))),
        Value::Char(c) => Ok(Some(crate::tree::InlineObject::text(c.to_string()))),
        Value::Int(i) => Ok(Some(crate::tree::InlineObject::text(i.to_string()))),
        Value::Float(x) => Ok(Some(crate::tree::InlineObject::text(x.to_string()))),
        Value::Bool(b) => Ok(Some(crate::tree::InlineObject::text(b.to_string()))),
        Value::Block(_) | Value::LayoutRef(_) => Err(Error::new(
            "cannot insert block content into a paragraph",
            ErrorKind::Layout,
        )),
        _ => Err(Error::new(
            "script result cannot be converted to text",
            ErrorKind::Interpretation,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_run_in_registration_order() {
        let mut scripting = Scripting::new();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            scripting.on(Phase::Layout, move |_| {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        scripting.run_hooks(Phase::Layout).unwrap();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        scripting.run_hooks(Phase::Finalise).unwrap();
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn style_stack_is_lifo() {
        let mut scripting = Scripting::new();
        assert_eq!(scripting.current_style(), Style::empty());
        scripting.push_style(Style::new().with_line_spacing(2.0));
        assert_eq!(scripting.current_style().line_spacing(), 2.0);
        scripting.pop_style();
        assert_eq!(scripting.current_style(), Style::empty());
    }

    #[test]
    fn relayout_flag_resets_per_pass() {
        let mut scripting = Scripting::new();
        scripting.request_layout();
        assert!(scripting.layout_requested());
        scripting.begin_pass(GlobalState::default());
        assert!(!scripting.layout_requested());
    }

    #[test]
    fn expressions_evaluate_against_the_interpreter() {
        let mut scripting = Scripting::new();
        let expr = Expr::new(|interp| Ok(Value::Int(interp.state().layout_pass as i64)));
        scripting.begin_pass(GlobalState {
            layout_pass: 3,
            ..GlobalState::default()
        });
        match scripting.evaluate(&expr).unwrap() {
            Value::Int(pass) => assert_eq!(pass, 3),
            other => panic!("unexpected value: {:?}", other),
        }
    }
}
