//! End-to-end extraction scenarios over real fixture projects.

mod common;

use common::{edge_between, edges_of, ingest_project};
use trellis_core::types::{ImportType, RelationType, ResolutionState, Scope};

#[test]
fn test_default_import_through_re_export_chain() {
    let (_dir, report) = ingest_project(&[
        ("a.ts", "import Foo from \"./b\";\nexport function use(): Foo { return new Foo(); }\n"),
        ("b.ts", "export { default } from \"./c\";\n"),
        ("c.ts", "export default class Foo {}\n"),
    ]);

    let import = edge_between(
        &report,
        RelationType::Imports,
        "file:a.ts",
        "file:c.ts:default",
    );
    assert_eq!(import.import_type, Some(ImportType::Default));
    assert_eq!(import.import_depth, Some(2));
    assert_eq!(import.resolution_state, Some(ResolutionState::Resolved));
    assert_eq!(import.resolved, Some(true));
    assert_eq!(import.language.as_deref(), Some("typescript"));
    assert_eq!(import.symbol_kind.as_deref(), Some("module"));
    assert!(import.id.starts_with("time-rel_"));
    assert_eq!(import.import_alias.as_deref(), Some("Foo"));

    // The re-exporting module records its hop too.
    let re_export = edge_between(
        &report,
        RelationType::Exports,
        "file:b.ts",
        "file:c.ts:default",
    );
    assert_eq!(re_export.is_re_export, Some(true));
    assert_eq!(re_export.re_export_target.as_deref(), Some("c.ts"));
    assert!(re_export.id.starts_with("time-rel_"));
}

#[test]
fn test_import_ids_reproducible_across_runs() {
    let files = &[
        ("a.ts", "import Foo from \"./b\";\n"),
        ("b.ts", "export { default } from \"./c\";\n"),
        ("c.ts", "export default class Foo {}\n"),
    ];
    let (_dir1, first) = ingest_project(files);
    let (_dir2, second) = ingest_project(files);

    let mut first_ids: Vec<&str> = first.rows.iter().map(|r| r.id.as_str()).collect();
    let mut second_ids: Vec<&str> = second.rows.iter().map(|r| r.id.as_str()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn test_duplicate_property_calls_aggregate() {
    let (_dir, report) = ingest_project(&[
        (
            "src/svc.ts",
            "export const svc = {\n  fetch(...args: unknown[]) { return args; },\n};\n",
        ),
        (
            "src/client.ts",
            "import { svc } from \"./svc\";\n\
             export class Client {\n\
               m(x: number, y: number, z: number) {\n\
                 svc.fetch(x);\n    svc.fetch(x);\n    svc.fetch(x);\n\
                 svc.fetch(y, z);\n    svc.fetch(y, z);\n\
               }\n\
             }\n",
        ),
    ]);

    let calls: Vec<_> = edges_of(&report, RelationType::Calls)
        .into_iter()
        .filter(|e| e.from_entity_id == "sym:src/client.ts#m")
        .collect();
    assert_eq!(calls.len(), 1, "five observations, one aggregated edge");
    let call = calls[0];
    assert_eq!(call.to_entity_id, "file:src/svc.ts:fetch");
    assert_eq!(call.metadata["occurrencesScan"], 5);
    assert_eq!(call.metadata["accessPath"], "svc.fetch");
    assert_eq!(call.metadata["arity"], 1, "earliest observation represents");
    assert_eq!(call.metadata["line"], 4);
    assert_eq!(call.scope, Some(Scope::Imported));

    let references: Vec<_> = edges_of(&report, RelationType::References)
        .into_iter()
        .filter(|e| {
            e.from_entity_id == "sym:src/client.ts#m"
                && e.to_entity_id == "file:src/svc.ts:fetch"
        })
        .collect();
    assert_eq!(references.len(), 1, "one companion REFERENCES");

    let depends: Vec<_> = edges_of(&report, RelationType::DependsOn)
        .into_iter()
        .filter(|e| {
            e.from_entity_id == "sym:src/client.ts#m"
                && e.to_entity_id == "file:src/svc.ts:fetch"
        })
        .collect();
    assert_eq!(depends.len(), 1, "one DEPENDS_ON for the imported usage");
    assert_eq!(depends[0].metadata["inferred"], true);
}

#[test]
fn test_destructuring_assignment_dataflow() {
    let (_dir, report) = ingest_project(&[(
        "flow.ts",
        "export function shuffle(src: { a: number; b: number }) {\n\
           let a = 0;\n  let b = 0;\n\
           ({ a, b } = src);\n\
           return a + b;\n\
         }\n",
    )]);

    let writes = edges_of(&report, RelationType::Writes);
    let targets: Vec<&str> = writes.iter().map(|e| e.to_entity_id.as_str()).collect();
    assert!(targets.contains(&"external:a"), "have: {targets:?}");
    assert!(targets.contains(&"external:b"), "have: {targets:?}");
    for write in &writes {
        assert_eq!(write.from_entity_id, "sym:flow.ts#shuffle");
        assert_eq!(write.metadata["operator"], "=");
        assert_eq!(write.metadata["kind"], "write");
        assert!(write.metadata["dataFlowId"]
            .as_str()
            .unwrap()
            .starts_with("df_"));
    }

    let reads = edges_of(&report, RelationType::Reads);
    assert!(
        reads
            .iter()
            .any(|e| e.to_entity_id == "external:src" && e.metadata["kind"] == "read"),
        "have: {:?}",
        reads
            .iter()
            .map(|e| e.to_entity_id.as_str())
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_mutating_method_writes_receiver() {
    let (_dir, report) = ingest_project(&[(
        "mutate.ts",
        "export function enqueue(x: number) {\n\
           const items: number[] = [];\n\
           items.push(x);\n\
           return items;\n\
         }\n",
    )]);

    let call = edge_between(
        &report,
        RelationType::Calls,
        "sym:mutate.ts#enqueue",
        "external:push",
    );
    assert_eq!(call.metadata["accessPath"], "items.push");

    let write = edge_between(
        &report,
        RelationType::Writes,
        "sym:mutate.ts#enqueue",
        "external:items",
    );
    assert_eq!(write.metadata["operator"], "mutate");
    assert_eq!(write.metadata["accessPath"], "items.push");
    assert!(write.metadata["dataFlowId"]
        .as_str()
        .unwrap()
        .starts_with("df_"));
}

#[test]
fn test_decorator_reference() {
    let (_dir, report) = ingest_project(&[(
        "service.ts",
        "import { Injectable } from \"@nestjs/common\";\n\n\
         @Injectable()\n\
         export class UserService {\n\
           find(id: string) { return id; }\n\
         }\n",
    )]);

    let decorated: Vec<_> = edges_of(&report, RelationType::References)
        .into_iter()
        .filter(|e| e.metadata.get("kind").map(|k| k == "decorator").unwrap_or(false))
        .collect();
    assert_eq!(decorated.len(), 1, "one decorator reference");
    let edge = decorated[0];
    assert_eq!(edge.from_entity_id, "sym:service.ts#UserService");
    assert_eq!(edge.to_entity_id, "file:@nestjs/common:Injectable");
    assert_eq!(edge.metadata["accessPath"], "Injectable()");
    assert_eq!(edge.scope, Some(Scope::Imported));
}

#[test]
fn test_heritage_and_overrides() {
    let (_dir, report) = ingest_project(&[
        (
            "base.ts",
            "export class Base {\n  render(): string { return \"\"; }\n}\n\
             export interface Drawable {\n  draw(): void;\n}\n",
        ),
        (
            "widget.ts",
            "import { Base, Drawable } from \"./base\";\n\
             export class Widget extends Base implements Drawable {\n\
               render(): string { return \"widget\"; }\n\
               draw(): void {}\n\
             }\n",
        ),
    ]);

    let extends = edge_between(
        &report,
        RelationType::Extends,
        "sym:widget.ts#Widget",
        "sym:base.ts#Base",
    );
    assert_eq!(extends.resolution_state, Some(ResolutionState::Resolved));

    edge_between(
        &report,
        RelationType::Implements,
        "sym:widget.ts#Widget",
        "sym:base.ts#Drawable",
    );

    let overrides = edge_between(
        &report,
        RelationType::Overrides,
        "sym:widget.ts#render",
        "sym:base.ts#render",
    );
    assert_eq!(overrides.resolution_state, Some(ResolutionState::Resolved));
}

#[test]
fn test_throws_and_signature_types() {
    let (_dir, report) = ingest_project(&[(
        "errors.ts",
        "export class QuotaError {}\n\
         export interface Request {\n  size: number;\n}\n\
         export function admit(req: Request): QuotaError {\n\
           if (req.size > 10) {\n    throw new QuotaError();\n  }\n\
           return new QuotaError();\n\
         }\n",
    )]);

    edge_between(
        &report,
        RelationType::Throws,
        "sym:errors.ts#admit",
        "sym:errors.ts#QuotaError",
    );
    edge_between(
        &report,
        RelationType::ReturnsType,
        "sym:errors.ts#admit",
        "sym:errors.ts#QuotaError",
    );
    let param = edge_between(
        &report,
        RelationType::ParamType,
        "sym:errors.ts#admit",
        "sym:errors.ts#Request",
    );
    assert_eq!(param.metadata["param"], "req");

    // The parameter type is also a dependency, at local-scope confidence.
    let depends = edge_between(
        &report,
        RelationType::DependsOn,
        "sym:errors.ts#admit",
        "sym:errors.ts#Request",
    );
    assert_eq!(depends.confidence, Some(0.9));
}

#[test]
fn test_containment_skeleton() {
    let (_dir, report) = ingest_project(&[(
        "src/box.ts",
        "export class Box {\n  open() {}\n}\n",
    )]);

    edge_between(
        &report,
        RelationType::Contains,
        "dir:src",
        "file:src/box.ts",
    );
    let defines = edge_between(
        &report,
        RelationType::Defines,
        "file:src/box.ts",
        "sym:src/box.ts#Box",
    );
    assert_eq!(defines.confidence, Some(0.95));
    edge_between(
        &report,
        RelationType::Contains,
        "sym:src/box.ts#Box",
        "sym:src/box.ts#open",
    );
}

#[test]
fn test_python_and_go_structural_edges() {
    let (_dir, report) = ingest_project(&[
        (
            "app/service.py",
            "import os\nfrom collections import OrderedDict\n\nclass Service:\n    def handle(self):\n        pass\n",
        ),
        (
            "cmd/main.go",
            "package main\n\nimport \"fmt\"\n\nfunc Run() {\n\tfmt.Println(\"ok\")\n}\n",
        ),
    ]);

    let py_import = edge_between(
        &report,
        RelationType::Imports,
        "file:app/service.py",
        "module:os",
    );
    assert_eq!(py_import.language.as_deref(), Some("python"));
    assert_eq!(py_import.resolution_state, Some(ResolutionState::Unresolved));

    edge_between(
        &report,
        RelationType::Imports,
        "file:app/service.py",
        "external:OrderedDict",
    );

    let go_import = edge_between(
        &report,
        RelationType::Imports,
        "file:cmd/main.go",
        "module:fmt",
    );
    assert_eq!(go_import.language.as_deref(), Some("go"));

    edge_between(
        &report,
        RelationType::Defines,
        "file:app/service.py",
        "sym:app/service.py#Service",
    );
    edge_between(
        &report,
        RelationType::Defines,
        "file:cmd/main.go",
        "sym:cmd/main.go#Run",
    );
}

#[test]
fn test_parser_errors_become_hints() {
    let (_dir, report) = ingest_project(&[(
        "broken.ts",
        "export function ok() { return 1; }\nfunction ( {\n",
    )]);

    let hints: Vec<_> = edges_of(&report, RelationType::References)
        .into_iter()
        .filter(|e| {
            e.metadata
                .get("kind")
                .map(|k| k == "maintainability")
                .unwrap_or(false)
        })
        .collect();
    assert!(!hints.is_empty(), "syntax damage should leave hints");
    assert!(hints.iter().all(|e| e.from_entity_id == "file:broken.ts"));
}
