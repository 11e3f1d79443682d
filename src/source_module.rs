//! Owned extraction of a parsed screen source module.
//!
//! oxc's AST borrows from its allocator, so each file is parsed once and immediately lowered into
//! these plain structs. The collector and the parse cache only ever see the lowered form.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, Class, ClassElement, ExportDefaultDeclarationKind, Expression,
    ImportDeclarationSpecifier, ModuleExportName, ObjectPropertyKind, PropertyKey, Statement,
    TSType, TSTypeName,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::model::TextSpan;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceModule {
    pub classes: Vec<RawClass>,
    pub imports: Vec<ImportBinding>,
    pub reexports: Vec<ReExport>,
    /// `export { Local as Exported }` without a source module.
    pub local_exports: Vec<(String, String)>,
    /// Class name behind `export default`.
    pub default_export: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawClass {
    pub name: String,
    pub span: TextSpan,
    pub super_class: Option<String>,
    pub members: Vec<RawMember>,
    pub decorators: Vec<RawDecorator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMember {
    pub name: String,
    pub span: TextSpan,
    pub type_name: Option<String>,
    pub type_argument: Option<String>,
    pub initializer: Option<RawCall>,
}

/// A call initializer: `callee(arg)` where `argument` is set only for a sole identifier argument.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub callee: String,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDecorator {
    pub name: String,
    pub string_args: Vec<(String, TextSpan)>,
    pub object_props: Vec<(String, String, TextSpan)>,
}

impl RawDecorator {
    pub fn object_prop(&self, key: &str) -> Option<(&str, TextSpan)> {
        self.object_props
            .iter()
            .find(|(k, _, _)| k == key)
            .map(|(_, v, span)| (v.as_str(), *span))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub local: String,
    /// Exported name in the source module; `default` and `*` for default and namespace imports.
    pub imported: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReExport {
    Named {
        exported: String,
        imported: String,
        source: String,
    },
    All {
        source: String,
    },
}

impl ReExport {
    pub fn source(&self) -> &str {
        match self {
            ReExport::Named { source, .. } | ReExport::All { source } => source,
        }
    }
}

impl SourceModule {
    pub fn class(&self, name: &str) -> Option<&RawClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn import(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.local == local)
    }

    /// Every module specifier this file pulls in, imports first.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .map(|i| i.source.as_str())
            .chain(self.reexports.iter().map(ReExport::source))
    }
}

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Parse source text. Returns `Err` with the first parser diagnostic when oxc gave up on the file.
pub fn parse_source_module(source: &str) -> Result<SourceModule, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if ret.panicked {
        let message = ret
            .errors
            .first()
            .map(|e| format!("{:?}", e))
            .unwrap_or_else(|| "parser aborted".to_string());
        return Err(message);
    }
    if !ret.errors.is_empty() {
        tracing::trace!(count = ret.errors.len(), "recovered from source parse errors");
    }

    let mut module = SourceModule::default();

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(import_decl) => {
                let source = import_decl.source.value.to_string();
                if let Some(specifiers) = &import_decl.specifiers {
                    for specifier in specifiers {
                        let (local, imported) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                (s.local.name.to_string(), export_name(&s.imported))
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                (s.local.name.to_string(), "default".to_string())
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                (s.local.name.to_string(), "*".to_string())
                            }
                        };
                        module.imports.push(ImportBinding {
                            local,
                            imported,
                            source: source.clone(),
                        });
                    }
                }
            }
            Statement::ExportNamedDeclaration(export_decl) => {
                if export_decl.declaration.is_some() {
                    // `export class X` is picked up by the class visitor below.
                    continue;
                }
                for specifier in &export_decl.specifiers {
                    let local = export_name(&specifier.local);
                    let exported = export_name(&specifier.exported);
                    match &export_decl.source {
                        Some(source) => module.reexports.push(ReExport::Named {
                            exported,
                            imported: local,
                            source: source.value.to_string(),
                        }),
                        None => module.local_exports.push((local, exported)),
                    }
                }
            }
            Statement::ExportAllDeclaration(export_all) => {
                if export_all.exported.is_none() {
                    module.reexports.push(ReExport::All {
                        source: export_all.source.value.to_string(),
                    });
                }
            }
            Statement::ExportDefaultDeclaration(export_default) => {
                match &export_default.declaration {
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        module.default_export = class.id.as_ref().map(|id| id.name.to_string());
                    }
                    ExportDefaultDeclarationKind::Identifier(ident) => {
                        module.default_export = Some(ident.name.to_string());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let mut collector = ClassCollector {
        classes: &mut module.classes,
    };
    collector.visit_program(&ret.program);

    Ok(module)
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

struct ClassCollector<'a> {
    classes: &'a mut Vec<RawClass>,
}

impl<'a, 'b> Visit<'b> for ClassCollector<'a> {
    fn visit_class(&mut self, class: &Class<'b>) {
        if let Some(id) = &class.id {
            self.classes.push(lower_class(id.name.as_str(), id.span.into(), class));
        }
        oxc_ast_visit::walk::walk_class(self, class);
    }
}

fn lower_class(name: &str, span: TextSpan, class: &Class) -> RawClass {
    let super_class = class.super_class.as_ref().and_then(expression_name);

    let decorators = class.decorators.iter().filter_map(|d| lower_decorator(&d.expression)).collect();

    let mut members = Vec::new();
    for element in &class.body.body {
        let ClassElement::PropertyDefinition(prop) = element else {
            continue;
        };
        let Some(member_name) = property_key_name(&prop.key) else {
            continue;
        };

        let (type_name, type_argument) = match prop.type_annotation.as_ref() {
            Some(annotation) => type_reference_parts(&annotation.type_annotation),
            None => (None, None),
        };

        let initializer = prop.value.as_ref().and_then(|value| match value {
            Expression::CallExpression(call) => {
                let callee = expression_name(&call.callee)?;
                let argument = match call.arguments.first() {
                    Some(Argument::Identifier(ident)) if call.arguments.len() == 1 => {
                        Some(ident.name.to_string())
                    }
                    _ => None,
                };
                Some(RawCall { callee, argument })
            }
            _ => None,
        });

        members.push(RawMember {
            name: member_name,
            span: prop.key.span().into(),
            type_name,
            type_argument,
            initializer,
        });
    }

    RawClass {
        name: name.to_string(),
        span,
        super_class,
        members,
        decorators,
    }
}

fn lower_decorator(expr: &Expression) -> Option<RawDecorator> {
    match expr {
        Expression::Identifier(ident) => Some(RawDecorator {
            name: ident.name.to_string(),
            string_args: Vec::new(),
            object_props: Vec::new(),
        }),
        Expression::CallExpression(call) => {
            let name = expression_name(&call.callee)?;
            let mut string_args = Vec::new();
            let mut object_props = Vec::new();
            for arg in &call.arguments {
                match arg {
                    Argument::StringLiteral(s) => {
                        string_args.push((s.value.to_string(), s.span.into()));
                    }
                    Argument::ObjectExpression(obj) => {
                        for prop in &obj.properties {
                            let ObjectPropertyKind::ObjectProperty(prop) = prop else {
                                continue;
                            };
                            let (Some(key), Expression::StringLiteral(value)) =
                                (property_key_name(&prop.key), &prop.value)
                            else {
                                continue;
                            };
                            object_props.push((key, value.value.to_string(), value.span.into()));
                        }
                    }
                    _ => {}
                }
            }
            Some(RawDecorator {
                name,
                string_args,
                object_props,
            })
        }
        _ => None,
    }
}

/// `Foo` and `ns.Foo` both name `Foo`.
fn expression_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::StaticMemberExpression(member) => Some(member.property.name.to_string()),
        _ => None,
    }
}

fn property_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

fn type_name_string(name: &TSTypeName) -> Option<String> {
    match name {
        TSTypeName::IdentifierReference(ident) => Some(ident.name.to_string()),
        TSTypeName::QualifiedName(qualified) => Some(qualified.right.name.to_string()),
        _ => None,
    }
}

/// Split `PXView<SOOrder>` into (`PXView`, `SOOrder`).
fn type_reference_parts(ts_type: &TSType) -> (Option<String>, Option<String>) {
    let TSType::TSTypeReference(reference) = ts_type else {
        return (None, None);
    };
    let type_name = type_name_string(&reference.type_name);
    let type_argument = reference
        .type_arguments
        .as_ref()
        .and_then(|args| args.params.first())
        .and_then(|param| match param {
            TSType::TSTypeReference(arg) => type_name_string(&arg.type_name),
            _ => None,
        });
    (type_name, type_argument)
}
