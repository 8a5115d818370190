//! Scope frames for name resolution.
//!
//! Frames live in an arena so uses can be resolved after the walk, which
//! makes hoisted declarations visible to earlier uses. The active stack is
//! what push/pop manipulate during the walk.

use std::collections::HashMap;
use std::ops::Range;

/// Index of a frame in the arena
pub type FrameId = usize;

/// Index of a declaration
pub type DeclId = usize;

/// The outermost frame, created once per call
pub const ROOT: FrameId = 0;

/// What opened a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Program,
    Function,
    Block,
}

/// How a name was bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Param,
    CatchParam,
    Import,
}

impl DeclKind {
    /// Bindings that may not share a frame with another binding of the same name
    pub fn is_block_scoped(self) -> bool {
        matches!(
            self,
            DeclKind::Let | DeclKind::Const | DeclKind::Class | DeclKind::Import
        )
    }

    /// Bindings reported when never read
    pub fn reports_unused(self) -> bool {
        matches!(
            self,
            DeclKind::Var | DeclKind::Let | DeclKind::Const | DeclKind::Import
        )
    }
}

/// A declared name
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub span: Range<usize>,
    /// Removing this range deletes the whole declaration statement
    pub removal: Option<Range<usize>>,
    pub exported: bool,
    pub reads: usize,
}

/// A set of names visible within one lexical block
#[derive(Debug)]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub parent: Option<FrameId>,
    names: HashMap<String, DeclId>,
}

/// Frame arena plus the stack of frames currently open
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    declarations: Vec<Declaration>,
    active: Vec<FrameId>,
}

impl ScopeStack {
    pub fn new() -> Self {
        let root = ScopeFrame {
            kind: FrameKind::Program,
            parent: None,
            names: HashMap::new(),
        };
        Self {
            frames: vec![root],
            declarations: Vec::new(),
            active: vec![ROOT],
        }
    }

    pub fn current(&self) -> FrameId {
        self.active.last().copied().unwrap_or(ROOT)
    }

    /// Open a child frame of the current one
    pub fn push(&mut self, kind: FrameKind) -> FrameId {
        let id = self.frames.len();
        self.frames.push(ScopeFrame {
            kind,
            parent: Some(self.current()),
            names: HashMap::new(),
        });
        self.active.push(id);
        id
    }

    /// Close the current frame. The root frame stays open.
    pub fn pop(&mut self) {
        if self.active.len() > 1 {
            self.active.pop();
        }
    }

    /// Frame that receives `var` bindings
    pub fn nearest_function(&self) -> FrameId {
        self.active
            .iter()
            .rev()
            .copied()
            .find(|&id| self.frames[id].kind != FrameKind::Block)
            .unwrap_or(ROOT)
    }

    /// Bind a name in `frame`. Returns `Err` with the existing declaration
    /// if the name is already bound there.
    pub fn declare(&mut self, frame: FrameId, decl: Declaration) -> Result<DeclId, DeclId> {
        if let Some(&existing) = self.frames[frame].names.get(&decl.name) {
            return Err(existing);
        }
        let id = self.declarations.len();
        self.frames[frame].names.insert(decl.name.clone(), id);
        self.declarations.push(decl);
        Ok(id)
    }

    /// Look up a name starting from `frame`, walking up parent frames.
    pub fn lookup(&self, frame: FrameId, name: &str) -> Option<DeclId> {
        let mut current = Some(frame);
        while let Some(id) = current {
            let f = &self.frames[id];
            if let Some(&decl) = f.names.get(name) {
                return Some(decl);
            }
            current = f.parent;
        }
        None
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        &self.declarations[id]
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.declarations[id]
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn depth(&self) -> usize {
        self.active.len()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, kind: DeclKind) -> Declaration {
        Declaration {
            name: name.to_string(),
            kind,
            span: 0..name.len(),
            removal: None,
            exported: false,
            reads: 0,
        }
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut scopes = ScopeStack::new();
        let outer = scopes.declare(ROOT, decl("a", DeclKind::Let)).unwrap();
        let inner_frame = scopes.push(FrameKind::Block);
        let inner = scopes.declare(inner_frame, decl("b", DeclKind::Const)).unwrap();

        assert_eq!(scopes.lookup(inner_frame, "a"), Some(outer));
        assert_eq!(scopes.lookup(inner_frame, "b"), Some(inner));
        assert_eq!(scopes.lookup(ROOT, "b"), None);
    }

    #[test]
    fn test_redeclaration_returns_existing() {
        let mut scopes = ScopeStack::new();
        let first = scopes.declare(ROOT, decl("x", DeclKind::Var)).unwrap();
        assert_eq!(scopes.declare(ROOT, decl("x", DeclKind::Let)), Err(first));
        assert_eq!(scopes.declarations().len(), 1);
    }

    #[test]
    fn test_shadowing_in_child_frame_is_allowed() {
        let mut scopes = ScopeStack::new();
        scopes.declare(ROOT, decl("x", DeclKind::Let)).unwrap();
        let child = scopes.push(FrameKind::Block);
        assert!(scopes.declare(child, decl("x", DeclKind::Let)).is_ok());
    }

    #[test]
    fn test_root_is_never_popped() {
        let mut scopes = ScopeStack::new();
        scopes.push(FrameKind::Function);
        scopes.pop();
        scopes.pop();
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.current(), ROOT);
    }

    #[test]
    fn test_nearest_function_skips_blocks() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.nearest_function(), ROOT);
        let function = scopes.push(FrameKind::Function);
        scopes.push(FrameKind::Block);
        scopes.push(FrameKind::Block);
        assert_eq!(scopes.nearest_function(), function);
    }

    #[test]
    fn test_block_scoped_kinds() {
        assert!(DeclKind::Let.is_block_scoped());
        assert!(DeclKind::Import.is_block_scoped());
        assert!(!DeclKind::Var.is_block_scoped());
        assert!(!DeclKind::Param.reports_unused());
    }
}
