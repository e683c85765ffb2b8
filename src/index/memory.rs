//! In-memory code model
//!
//! A complete [`CodeIndex`] over declarations registered through a small
//! builder API. Structural edits (adding or removing declarations, changing
//! annotations, supertypes or field types) advance the structural version;
//! expression-body edits do not.

use super::{CodeIndex, SearchScope, SourceUnit, StructuralVersion};
use crate::decl::{
    Annotation, AttributeValue, ConstValue, Declaration, ExprDecl, ExprKind, FieldDecl, TypeDecl,
};
use crate::handle::{DeclId, ElementHandle, ElementKind};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
struct Model {
    next_id: u64,
    version: u64,
    declarations: HashMap<DeclId, Declaration>,
    /// Qualified name → type ids
    types_by_name: HashMap<String, Vec<DeclId>>,
    /// Type id → own field ids, in declaration order
    fields_by_owner: HashMap<DeclId, Vec<DeclId>>,
    /// Module → direct dependencies
    dependencies: HashMap<String, BTreeSet<String>>,
    modules: BTreeSet<String>,
}

impl Model {
    fn allocate(&mut self, kind: ElementKind) -> ElementHandle {
        self.next_id += 1;
        ElementHandle::new(kind, DeclId(self.next_id))
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn get(&self, handle: &ElementHandle) -> Option<&Declaration> {
        self.declarations
            .get(&handle.id)
            .filter(|decl| decl.kind() == handle.kind)
    }

    fn type_decl(&self, id: DeclId) -> Option<&TypeDecl> {
        match self.declarations.get(&id)? {
            Declaration::Type(ty) => Some(ty),
            _ => None,
        }
    }

    fn field_decl(&self, id: DeclId) -> Option<&FieldDecl> {
        match self.declarations.get(&id)? {
            Declaration::Field(field) => Some(field),
            _ => None,
        }
    }

    fn types_in_scope<'a>(&'a self, scope: &'a SearchScope) -> impl Iterator<Item = &'a TypeDecl> + 'a {
        self.declarations.values().filter_map(move |decl| match decl {
            Declaration::Type(ty) if scope.contains(&ty.module) => Some(ty),
            _ => None,
        })
    }

    fn is_subtype_of(&self, ty: &TypeDecl, targets: &HashSet<DeclId>) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<DeclId> = ty.supertypes.iter().map(|h| h.id).collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if targets.contains(&current) {
                return true;
            }
            if let Some(parent) = self.type_decl(current) {
                stack.extend(parent.supertypes.iter().map(|h| h.id));
            }
        }
        false
    }

    fn evaluate(&self, expression: &ElementHandle, visiting: &mut HashSet<DeclId>) -> Option<ConstValue> {
        // Constant initializers referring back to themselves never fold.
        if !visiting.insert(expression.id) {
            return None;
        }
        let result = match self.get(expression)? {
            Declaration::Expression(expr) => match &expr.expr {
                ExprKind::Literal { value } => Some(value.clone()),
                ExprKind::Reference { target } => {
                    let field = self.field_decl(target.as_ref()?.id)?;
                    if !(field.is_static && field.is_final) {
                        return None;
                    }
                    let initializer = field.initializer?;
                    self.evaluate(&initializer, visiting)
                }
                ExprKind::Concat { operands } => {
                    let values = operands
                        .iter()
                        .map(|op| self.evaluate(op, visiting))
                        .collect::<Option<Vec<_>>>()?;
                    fold_plus(values)
                }
                ExprKind::ClassLiteral { .. } | ExprKind::Opaque { .. } => None,
            },
            _ => None,
        };
        visiting.remove(&expression.id);
        result
    }
}

/// Fold `a + b + ...` left to right: numeric addition while both sides are
/// numbers, string concatenation from the first string operand on.
fn fold_plus(values: Vec<ConstValue>) -> Option<ConstValue> {
    let mut values = values.into_iter();
    let first = values.next()?;
    values.try_fold(first, plus)
}

fn plus(left: ConstValue, right: ConstValue) -> Option<ConstValue> {
    match (left, right) {
        (ConstValue::Str(l), r) => Some(ConstValue::Str(format!("{}{}", l, r))),
        (l, ConstValue::Str(r)) => Some(ConstValue::Str(format!("{}{}", l, r))),
        (ConstValue::Float(l), r) => Some(ConstValue::Float(l + integral(&r)? as f64)),
        (l, ConstValue::Float(r)) => Some(ConstValue::Float(integral(&l)? as f64 + r)),
        (l, r) => integral(&l)?.checked_add(integral(&r)?).map(ConstValue::Int),
    }
}

/// Integer value of an `int` or `char` operand
fn integral(value: &ConstValue) -> Option<i64> {
    match value {
        ConstValue::Int(i) => Some(*i),
        ConstValue::Char(c) => Some(i64::from(u32::from(*c))),
        _ => None,
    }
}

fn simple_name(qualified_name: &str) -> String {
    qualified_name
        .rsplit_once('.')
        .map(|(_, name)| name)
        .unwrap_or(qualified_name)
        .to_string()
}

/// Thread-safe in-memory code model.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    model: RwLock<Model>,
}

impl InMemoryIndex {
    /// Create an empty model at structural version 0
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Structural edits ==========

    /// Declare a named type in `module`
    pub fn add_type(&self, module: &str, qualified_name: &str) -> ElementHandle {
        let mut model = self.model.write();
        let handle = model.allocate(ElementKind::Type);
        model.modules.insert(module.to_string());
        model
            .types_by_name
            .entry(qualified_name.to_string())
            .or_default()
            .push(handle.id);
        model.declarations.insert(
            handle.id,
            Declaration::Type(TypeDecl {
                handle,
                name: Some(simple_name(qualified_name)),
                qualified_name: Some(qualified_name.to_string()),
                module: module.to_string(),
                annotations: Vec::new(),
                supertypes: Vec::new(),
            }),
        );
        model.bump();
        handle
    }

    /// Declare an anonymous type (no name, no qualified name)
    pub fn add_anonymous_type(&self, module: &str) -> ElementHandle {
        let mut model = self.model.write();
        let handle = model.allocate(ElementKind::Type);
        model.modules.insert(module.to_string());
        model.declarations.insert(
            handle.id,
            Declaration::Type(TypeDecl {
                handle,
                name: None,
                qualified_name: None,
                module: module.to_string(),
                annotations: Vec::new(),
                supertypes: Vec::new(),
            }),
        );
        model.bump();
        handle
    }

    /// Declare an instance field on `owner`
    pub fn add_field(&self, owner: &ElementHandle, name: &str) -> ElementHandle {
        self.insert_field(owner, Some(name))
    }

    /// Declare a field without a usable identifier
    pub fn add_anonymous_field(&self, owner: &ElementHandle) -> ElementHandle {
        self.insert_field(owner, None)
    }

    fn insert_field(&self, owner: &ElementHandle, name: Option<&str>) -> ElementHandle {
        let mut model = self.model.write();
        let handle = model.allocate(ElementKind::Field);
        model.fields_by_owner.entry(owner.id).or_default().push(handle.id);
        model.declarations.insert(
            handle.id,
            Declaration::Field(FieldDecl {
                handle,
                name: name.map(str::to_string),
                owner: *owner,
                is_static: false,
                is_final: false,
                annotations: Vec::new(),
                type_ref: None,
                initializer: None,
            }),
        );
        model.bump();
        handle
    }

    /// Declare a `static final` constant field initialized with `value`
    pub fn add_constant(&self, owner: &ElementHandle, name: &str, value: impl Into<ConstValue>) -> ElementHandle {
        let field = self.add_field(owner, name);
        let init = self.add_literal(value);
        self.edit_field(&field, |f| {
            f.is_static = true;
            f.is_final = true;
            f.initializer = Some(init);
        });
        field
    }

    /// Mark a field static
    pub fn set_static(&self, field: &ElementHandle, is_static: bool) {
        self.edit_field(field, |f| f.is_static = is_static);
    }

    /// Set the resolved declared type of a field
    pub fn set_field_type(&self, field: &ElementHandle, type_ref: &ElementHandle) {
        let type_ref = *type_ref;
        self.edit_field(field, |f| f.type_ref = Some(type_ref));
    }

    /// Apply an annotation to a type or field
    pub fn annotate(&self, target: &ElementHandle, annotation: Annotation) {
        let mut model = self.model.write();
        match model.declarations.get_mut(&target.id) {
            Some(Declaration::Type(ty)) if target.kind == ElementKind::Type => ty.annotations.push(annotation),
            Some(Declaration::Field(f)) if target.kind == ElementKind::Field => f.annotations.push(annotation),
            _ => return,
        }
        model.bump();
    }

    /// Make `ty` extend or implement `supertype`
    pub fn add_supertype(&self, ty: &ElementHandle, supertype: &ElementHandle) {
        let mut model = self.model.write();
        if let Some(Declaration::Type(decl)) = model.declarations.get_mut(&ty.id) {
            decl.supertypes.push(*supertype);
            model.bump();
        }
    }

    /// Make declarations of `dependency` visible from `module`
    pub fn add_dependency(&self, module: &str, dependency: &str) {
        let mut model = self.model.write();
        model.modules.insert(module.to_string());
        model.modules.insert(dependency.to_string());
        model
            .dependencies
            .entry(module.to_string())
            .or_default()
            .insert(dependency.to_string());
        model.bump();
    }

    /// Remove a declaration; a type takes its own fields with it
    pub fn remove(&self, handle: &ElementHandle) {
        let mut model = self.model.write();
        let Some(decl) = model.declarations.remove(&handle.id) else {
            return;
        };
        match decl {
            Declaration::Type(ty) => {
                if let Some(name) = &ty.qualified_name {
                    if let Some(ids) = model.types_by_name.get_mut(name) {
                        ids.retain(|id| *id != handle.id);
                    }
                }
                let fields = model.fields_by_owner.remove(&handle.id).unwrap_or_default();
                for field in fields {
                    model.declarations.remove(&field);
                }
            }
            Declaration::Field(field) => {
                if let Some(ids) = model.fields_by_owner.get_mut(&field.owner.id) {
                    ids.retain(|id| *id != handle.id);
                }
            }
            Declaration::Expression(_) => {}
        }
        model.bump();
    }

    /// Advance the structural version without any other change
    pub fn bump_version(&self) -> StructuralVersion {
        let mut model = self.model.write();
        model.bump();
        StructuralVersion(model.version)
    }

    fn edit_field(&self, field: &ElementHandle, edit: impl FnOnce(&mut FieldDecl)) {
        let mut model = self.model.write();
        if let Some(Declaration::Field(decl)) = model.declarations.get_mut(&field.id) {
            edit(decl);
            model.bump();
        }
    }

    // ========== Expressions ==========

    /// Register an expression element. Expressions are not structure.
    pub fn add_expression(&self, expr: ExprKind) -> ElementHandle {
        let mut model = self.model.write();
        let handle = model.allocate(ElementKind::Expression);
        model
            .declarations
            .insert(handle.id, Declaration::Expression(ExprDecl { handle, expr }));
        handle
    }

    pub fn add_literal(&self, value: impl Into<ConstValue>) -> ElementHandle {
        self.add_expression(ExprKind::Literal { value: value.into() })
    }

    /// Replace an expression body in place (no structural version change)
    pub fn replace_expression(&self, expression: &ElementHandle, expr: ExprKind) {
        let mut model = self.model.write();
        if let Some(Declaration::Expression(decl)) = model.declarations.get_mut(&expression.id) {
            decl.expr = expr;
        }
    }

    /// Attribute value holding a string literal
    pub fn literal_attribute(&self, value: impl Into<ConstValue>) -> AttributeValue {
        AttributeValue::Expression {
            expression: self.add_literal(value),
        }
    }

    /// Attribute value referring to a constant field, e.g. `Tables.USERS`
    pub fn reference_attribute(&self, target: &ElementHandle) -> AttributeValue {
        AttributeValue::Expression {
            expression: self.add_expression(ExprKind::Reference { target: Some(*target) }),
        }
    }

    /// Attribute value holding `Type.class`
    pub fn class_literal_attribute(&self, operand: &ElementHandle) -> AttributeValue {
        let expression = self.add_expression(ExprKind::ClassLiteral { operand: Some(*operand) });
        AttributeValue::ClassLiteral {
            expression,
            operand: Some(*operand),
        }
    }

    /// Current structural version of the whole model
    pub fn version(&self) -> StructuralVersion {
        StructuralVersion(self.model.read().version)
    }
}

impl CodeIndex for InMemoryIndex {
    fn resolve_scope(&self, unit: &SourceUnit) -> Option<SearchScope> {
        let model = self.model.read();
        if !model.modules.contains(&unit.module) {
            return None;
        }

        let mut visible = BTreeSet::new();
        let mut stack = vec![unit.module.clone()];
        while let Some(module) = stack.pop() {
            if !visible.insert(module.clone()) {
                continue;
            }
            if let Some(deps) = model.dependencies.get(&module) {
                stack.extend(deps.iter().cloned());
            }
        }
        Some(SearchScope::new(visible))
    }

    fn find_types_by_qualified_name(&self, name: &str, scope: &SearchScope) -> Vec<ElementHandle> {
        let model = self.model.read();
        model
            .types_by_name
            .get(name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| model.type_decl(*id))
                    .filter(|ty| scope.contains(&ty.module))
                    .map(|ty| ty.handle)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }

    fn search_annotated_elements(
        &self,
        annotation_type: &ElementHandle,
        scope: &SearchScope,
    ) -> Vec<ElementHandle> {
        let model = self.model.read();
        let Some(qualified_name) = model
            .type_decl(annotation_type.id)
            .and_then(|ty| ty.qualified_name.clone())
        else {
            return Vec::new();
        };

        let direct: HashSet<DeclId> = model
            .types_in_scope(scope)
            .filter(|ty| ty.annotations.iter().any(|a| a.qualified_name == qualified_name))
            .map(|ty| ty.handle.id)
            .collect();

        let mut hits: Vec<ElementHandle> = model
            .types_in_scope(scope)
            .filter(|ty| direct.contains(&ty.handle.id) || model.is_subtype_of(ty, &direct))
            .map(|ty| ty.handle)
            .collect();
        hits.sort();
        hits
    }

    fn evaluate_constant_expression(&self, expression: &ElementHandle) -> Option<ConstValue> {
        let model = self.model.read();
        model.evaluate(expression, &mut HashSet::new())
    }

    fn current_structural_version(&self, _unit: &SourceUnit) -> StructuralVersion {
        self.version()
    }

    fn declaration(&self, handle: &ElementHandle) -> Option<Declaration> {
        self.model.read().get(handle).cloned()
    }

    fn fields_of(&self, type_handle: &ElementHandle) -> Vec<ElementHandle> {
        let model = self.model.read();
        let mut fields = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([type_handle.id]);

        // Own fields first, then each supertype in declaration order.
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(ty) = model.type_decl(current) else {
                continue;
            };
            if let Some(ids) = model.fields_by_owner.get(&current) {
                fields.extend(ids.iter().map(|id| ElementHandle::new(ElementKind::Field, *id)));
            }
            queue.extend(ty.supertypes.iter().map(|h| h.id));
        }
        fields
    }
}
