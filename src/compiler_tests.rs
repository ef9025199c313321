//! Compiler rewrite tests.
//!
//! Expected outputs are exact strings: the rewrite must not touch anything
//! outside the declarations it replaces.

#[cfg(test)]
mod tests {
    use crate::{
        compile, compile_batch, has_module_syntax, make_unique_id, CompileError, CompileOptions,
        SourceKind,
    };

    fn compile_code(code: &str) -> String {
        compile(code, &CompileOptions::default()).unwrap().code
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ORCHESTRATION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_member_calls_named_import_export_are_not_module_syntax() {
        let code = "thing.export(1);\nthing.import(2);\n";
        assert!(!has_module_syntax(code));

        let output = compile(code, &CompileOptions::default()).unwrap();
        assert_eq!(output.source_type, SourceKind::Script);
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_alias_skips_used_suffixes() {
        assert_eq!(make_unique_id("alias", "alias0 + alias3"), "alias4");
        assert_eq!(make_unique_id("module", "module.exports = 1"), "module1");
        assert_eq!(make_unique_id("module", "modules.length"), "module");
        assert_eq!(make_unique_id("module", ""), "module");
        assert_eq!(make_unique_id("module", "module007"), "module8");
        assert_eq!(make_unique_id("$m", "$m + $m2"), "$m3");
    }

    #[test]
    fn test_alias_suffix_past_u64_range() {
        assert_eq!(
            make_unique_id("module", "module18446744073709551615"),
            "module18446744073709551616"
        );
        assert_eq!(make_unique_id("m", "m99999999999999999999999"), "m100000000000000000000000");
    }

    #[test]
    fn test_invalid_alias_is_rejected() {
        for alias in ["", "1x", "a.b"] {
            let options = CompileOptions::default().with_module_alias(alias);
            let err = compile("export let a;", &options).unwrap_err();
            assert!(matches!(err, CompileError::InvalidAlias(ref a) if a == alias));
        }
    }

    #[test]
    fn test_taken_alias_is_suffixed_in_output() {
        let output = compile_code("const module = 1;\nexport { module as m };");
        assert_eq!(output, "module1.export({m:()=>module},true);const module = 1;\n");
    }

    #[test]
    fn test_recompiling_output_is_a_no_op() {
        let source = "import { a } from \"./a\";\nexport let count = a;\ncount += 1;\nexport default count;\n";
        let once = compile_code(source);
        let twice = compile_code(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_live_counter_module() {
        let output = compile(
            "import { a } from \"./a\";\nexport let count = 0;\ncount++;",
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(output.source_type, SourceKind::Module);
        assert_eq!(
            output.code,
            "module.export({count:()=>count});let a;module.importSync(\"./a\",{a(v){a=v}},0);\nlet count = 0;\nmodule.runSetters(count++);"
        );
    }

    #[test]
    fn test_script_source_type_returns_input() {
        let options = CompileOptions::default().with_source_type(SourceKind::Script);
        let output = compile("var x = 1;\n", &options).unwrap();
        assert_eq!(output.source_type, SourceKind::Script);
        assert_eq!(output.code, "var x = 1;\n");
    }

    #[test]
    fn test_requested_module_stays_module_without_rewrites() {
        let options = CompileOptions::default().with_source_type(SourceKind::Module);
        let output = compile("var x = 1;\n", &options).unwrap();
        assert_eq!(output.source_type, SourceKind::Module);
        assert_eq!(output.code, "var x = 1;\n");
    }

    #[test]
    fn test_keyword_in_comment_stays_script() {
        let code = "// export this later\nvar x = 1;\n";
        assert!(has_module_syntax(code));
        let output = compile(code, &CompileOptions::default()).unwrap();
        assert_eq!(output.source_type, SourceKind::Script);
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_sloppy_script_falls_back_to_script_parse() {
        let code = "with (obj) { x = \"import\"; }\n";
        let output = compile(code, &CompileOptions::default()).unwrap();
        assert_eq!(output.source_type, SourceKind::Script);
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let options = CompileOptions::default().with_source_type(SourceKind::Module);
        let err = compile("export let = ;", &options).unwrap_err();
        match err {
            CompileError::Parse(messages) => assert!(!messages.is_empty()),
            other => panic!("expected parse error, got {other:?}"),
        }

        assert!(compile("export let = ;", &CompileOptions::default()).is_err());
    }

    #[test]
    fn test_shebang_is_stripped_but_its_line_kept() {
        let output = compile_code("#!/usr/bin/env node\nexport const a = 1;");
        assert_eq!(output, "module.export({a:()=>a},true);\nconst a = 1;");
    }

    #[test]
    fn test_custom_alias_option() {
        let options = CompileOptions::default().with_module_alias("mod");
        let output = compile("export default 42;", &options).unwrap();
        assert_eq!(output.code, "mod.exportDefault(42);");
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let sources = vec![
            "export const a = 1;".to_string(),
            "var b = 2;".to_string(),
            "export let = ;".to_string(),
        ];
        let results = compile_batch(&sources, &CompileOptions::default());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().source_type, SourceKind::Module);
        assert_eq!(results[1].as_ref().unwrap().code, "var b = 2;");
        assert!(results[2].is_err());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // IMPORTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_default_and_renamed_imports() {
        let output = compile_code("import d, { x as y } from \"./m\";");
        assert_eq!(
            output,
            "let d,y;module.importSync(\"./m\",{default(v){d=v},x(v){y=v}},0);"
        );
    }

    #[test]
    fn test_bare_import() {
        assert_eq!(compile_code("import \"./side\";"), "module.importSync(\"./side\");");
    }

    #[test]
    fn test_namespace_import() {
        let output = compile_code("import * as ns from \"./m\";\nns.x;");
        assert_eq!(
            output,
            "const ns=Object.create(null);module.importSync(\"./m\",{\"*\"(v,n){ns[n]=v}},0,[ns]);\nns.x;"
        );
    }

    #[test]
    fn test_same_import_bound_twice_shares_one_setter() {
        let output = compile_code("import { a, a as b } from \"./m\";");
        assert_eq!(
            output,
            "let a,b;module.importSync(\"./m\",{a(v){a=v;b=v}},0);"
        );
    }

    #[test]
    fn test_setter_parameter_avoids_local_names() {
        let output = compile_code("import { v } from \"./m\";");
        assert_eq!(output, "let v;module.importSync(\"./m\",{v(v_){v=v_}},0);");
    }

    #[test]
    fn test_imports_are_keyed_by_position() {
        let output = compile_code("import \"./a\";\nimport { b } from \"./b\";");
        assert_eq!(
            output,
            "let b;module.importSync(\"./a\");module.importSync(\"./b\",{b(v){b=v}},14);\n"
        );
    }

    #[test]
    fn test_multiline_import_keeps_following_lines_in_place() {
        let source = "import {\n  a,\n  b\n} from \"./m\";\nconsole.log(a);";
        let output = compile_code(source);
        assert_eq!(output.lines().count(), source.lines().count());
        assert_eq!(output.lines().nth(4), Some("console.log(a);"));
        assert!(output.starts_with("let a,b;module.importSync(\"./m\",{a(v){a=v},b(v){b=v}},0);"));
    }

    #[test]
    fn test_exported_import_propagates_onward() {
        let output = compile_code("import { a } from \"./a\";\nexport { a };");
        assert_eq!(
            output,
            "module.export({a:()=>a});let a;module.importSync(\"./a\",{a(v){module.runSetters(a=v)}},0);\n"
        );
    }

    #[test]
    fn test_dynamic_import() {
        let output = compile("const m = import(\"./m\");", &CompileOptions::default()).unwrap();
        assert_eq!(output.source_type, SourceKind::Module);
        assert_eq!(output.code, "const m = module.import(\"./m\");");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // EXPORTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_const_export_is_constant() {
        assert_eq!(
            compile_code("export const x = 1;"),
            "module.export({x:()=>x},true);const x = 1;"
        );
    }

    #[test]
    fn test_destructured_exports() {
        let output = compile_code("export let { a, b: [c] } = obj;");
        assert_eq!(
            output,
            "module.export({a:()=>a,c:()=>c});let { a, b: [c] } = obj;"
        );
    }

    #[test]
    fn test_export_specifiers() {
        let output = compile_code("let a = 1;\nexport { a as b, a as \"a-b\" };");
        assert_eq!(
            output,
            "module.export({b:()=>a,\"a-b\":()=>a});let a = 1;\n"
        );
    }

    #[test]
    fn test_default_expression() {
        assert_eq!(
            compile_code("export default a + b;"),
            "module.exportDefault(a + b);"
        );
    }

    #[test]
    fn test_anonymous_default_declarations_are_named() {
        assert_eq!(
            compile_code("export default function () {}"),
            "module.export({default:()=>moduleDefault});function moduleDefault() {}"
        );
        assert_eq!(
            compile_code("export default async function(){}"),
            "module.export({default:()=>moduleDefault});async function moduleDefault(){}"
        );
        assert_eq!(
            compile_code("export default function* () {}"),
            "module.export({default:()=>moduleDefault});function* moduleDefault() {}"
        );
        assert_eq!(
            compile_code("export default class {}"),
            "module.export({default:()=>moduleDefault});class moduleDefault {}"
        );
    }

    #[test]
    fn test_anonymous_default_function_is_exported_before_imports_run() {
        let output = compile_code("import { b } from \"./b\";\nexport default function () { return b; }");
        assert_eq!(
            output,
            "module.export({default:()=>moduleDefault});let b;module.importSync(\"./b\",{b(v){b=v}},0);\nfunction moduleDefault() { return b; }"
        );
    }

    #[test]
    fn test_named_default_function_stays_a_declaration() {
        let output = compile_code("export default function f() {}\nf = 1;");
        assert_eq!(
            output,
            "module.export({default:()=>f});function f() {}\nmodule.runSetters(f = 1);"
        );
    }

    #[test]
    fn test_re_export_named() {
        let output = compile_code("export { a, b as c } from \"./m\";");
        assert_eq!(
            output,
            "module.importSync(\"./m\",{a(v){module.export({a:()=>v},true)},b(v){module.export({c:()=>v},true)}},0);"
        );
    }

    #[test]
    fn test_re_export_all_skips_default() {
        let output = compile_code("export * from \"./m\";");
        assert_eq!(
            output,
            "module.importSync(\"./m\",{\"*\"(v,n){n!==\"default\"&&module.export({[n]:()=>v},true)}},0);"
        );
    }

    #[test]
    fn test_re_export_namespace() {
        let output = compile_code("export * as ns from \"./m\";");
        assert_eq!(
            output,
            "(o=>{module.export({ns:()=>o},true);module.importSync(\"./m\",{\"*\"(v,n){o[n]=v}},0,[o])})(Object.create(null));"
        );
    }

    #[test]
    fn test_directive_prologue_stays_first() {
        assert_eq!(
            compile_code("\"use strict\";\nexport let a;"),
            "\"use strict\";module.export({a:()=>a});\nlet a;"
        );
        assert_eq!(
            compile_code("\"use strict\"\nexport let a;"),
            "\"use strict\";module.export({a:()=>a});\nlet a;"
        );
    }

    #[test]
    fn test_typescript_type_only_syntax_registers_nothing() {
        let options = CompileOptions {
            typescript: true,
            ..CompileOptions::default()
        };
        let source = "import type { T } from \"./t\";\nimport { type U, v } from \"./u\";\nexport type { T };\nexport const k: T = v;";
        let output = compile(source, &options).unwrap().code;

        assert!(!output.contains("./t"));
        assert!(!output.contains("U"));
        assert!(output.contains("module.export({k:()=>k},true);let v;"));
        assert!(output.contains("{v(v_){v=v_}}"));
        assert!(output.ends_with("\n\n\nconst k: T = v;"));
    }

    #[test]
    fn test_ambient_module_bodies_are_untouched() {
        let options = CompileOptions {
            typescript: true,
            ..CompileOptions::default()
        };
        let source = "declare module \"x\" {\n  export const y: number;\n}\nexport const z = 1;";
        let output = compile(source, &options).unwrap().code;
        assert_eq!(
            output,
            "module1.export({z:()=>z},true);declare module \"x\" {\n  export const y: number;\n}\nconst z = 1;"
        );
    }

    #[test]
    fn test_exported_namespace_is_a_live_binding() {
        let options = CompileOptions {
            typescript: true,
            ..CompileOptions::default()
        };
        let source = "export let count = 0;\nexport namespace N { export const a = 1; count = 5; }";
        let output = compile(source, &options).unwrap().code;
        assert_eq!(
            output,
            "module.export({count:()=>count,N:()=>N});let count = 0;\nnamespace N { export const a = 1; module.runSetters(count = 5); }"
        );
    }

    #[test]
    fn test_namespace_members_shadow_exported_locals() {
        let options = CompileOptions {
            typescript: true,
            ..CompileOptions::default()
        };
        let source = "export let a = 0;\nnamespace N { export let a = 1; a = 2; }";
        let output = compile(source, &options).unwrap().code;
        assert_eq!(
            output,
            "module.export({a:()=>a});let a = 0;\nnamespace N { export let a = 1; a = 2; }"
        );
    }

    #[test]
    fn test_type_only_namespace_registers_nothing() {
        let options = CompileOptions {
            typescript: true,
            ..CompileOptions::default()
        };
        let output = compile("export namespace T { export type X = 1; }", &options).unwrap();
        assert_eq!(output.source_type, SourceKind::Module);
        assert_eq!(output.code, "namespace T { export type X = 1; }");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ASSIGNMENTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_compound_assignment_passes_value_through() {
        let output = compile_code("export let a = 1;\nconsole.log(a += 3);");
        assert_eq!(
            output,
            "module.export({a:()=>a});let a = 1;\nconsole.log(module.runSetters(a += 3));"
        );
    }

    #[test]
    fn test_destructuring_assignment_is_wrapped_once() {
        let output = compile_code("export let a, b;\n[a, b] = [1, 2];");
        assert_eq!(
            output,
            "module.export({a:()=>a,b:()=>b});let a, b;\nmodule.runSetters([a, b] = [1, 2]);"
        );
    }

    #[test]
    fn test_chained_assignments_nest() {
        let output = compile_code("export let a, b;\na = b = 1;");
        assert_eq!(
            output,
            "module.export({a:()=>a,b:()=>b});let a, b;\nmodule.runSetters(a = module.runSetters(b = 1));"
        );
    }

    #[test]
    fn test_member_writes_are_not_wrapped() {
        let output = compile_code("export let o = {};\no.x = 1;\no[k] = 2;");
        assert_eq!(
            output,
            "module.export({o:()=>o});let o = {};\no.x = 1;\no[k] = 2;"
        );
    }

    #[test]
    fn test_shadowed_writes_are_not_wrapped() {
        let source = "export let x = 0;\nfunction f(x) { x = 1; }\n{ let x; x = 2; }\nfor (let x of xs) x++;\ntry {} catch (x) { x = 4; }\nconst g = () => { var x; x = 5; };\nx = 3;";
        let output = compile_code(source);
        assert_eq!(output.matches("runSetters").count(), 1);
        assert!(output.ends_with("\nmodule.runSetters(x = 3);"));
    }

    #[test]
    fn test_writes_inside_nested_functions_are_wrapped() {
        let output = compile_code("export let n = 0;\nexport function inc() { n++; }");
        assert_eq!(
            output,
            "module.export({n:()=>n,inc:()=>inc});let n = 0;\nfunction inc() { module.runSetters(n++); }"
        );
    }
}
