//! Executes one verification script and validates its return value.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rhai::{Dynamic, Engine, Scope, AST};
use tempfile::TempPath;

use super::engine::build_engine;
use super::error::{ScriptError, ScriptResult};
use super::input_api::InputApi;
use super::output_api::OutputApi;
use crate::change::Change;
use crate::result::ResultItem;

/// Entry point invoked for upload-time runs.
pub const UPLOAD_ENTRY_POINT: &str = "check_change_on_upload";

/// Entry point invoked for commit-time runs.
pub const COMMIT_ENTRY_POINT: &str = "check_change_on_commit";

/// Runs scripts against one change. Scripts share the engine and the change's
/// metadata cache; each gets a fresh scope.
pub struct ScriptExecutor {
    engine: Engine,
    change: Rc<Change>,
    committing: bool,
    temp_files: Rc<RefCell<Vec<TempPath>>>,
}

impl ScriptExecutor {
    pub fn new(change: Rc<Change>, committing: bool, max_operations: u64) -> Self {
        Self {
            engine: build_engine(max_operations),
            change,
            committing,
            temp_files: Rc::default(),
        }
    }

    /// Name of the entry point this executor invokes.
    pub fn entry_point(&self) -> &'static str {
        if self.committing {
            COMMIT_ENTRY_POINT
        } else {
            UPLOAD_ENTRY_POINT
        }
    }

    /// Read and execute the script at `location`.
    pub fn execute_file(&self, location: &Path) -> ScriptResult<Vec<ResultItem>> {
        let text = std::fs::read_to_string(location).map_err(|source| ScriptError::Read {
            path: location.to_path_buf(),
            source,
        })?;
        self.execute(&text, location)
    }

    /// Execute `script` as if it were located at `location`.
    ///
    /// A script without the relevant entry point contributes nothing; its
    /// top-level statements still run.
    pub fn execute(&self, script: &str, location: &Path) -> ScriptResult<Vec<ResultItem>> {
        let entry_point = self.entry_point();
        let ast = self
            .engine
            .compile(script)
            .map_err(|err| ScriptError::Compile {
                path: location.to_path_buf(),
                message: err.to_string(),
            })?;
        let runtime = |err: Box<rhai::EvalAltResult>| ScriptError::Runtime {
            path: location.to_path_buf(),
            entry_point: entry_point.to_string(),
            message: err.to_string(),
        };

        let mut scope = Scope::new();
        if !defines_entry_point(&ast, entry_point) {
            self.engine
                .run_ast_with_scope(&mut scope, &ast)
                .map_err(runtime)?;
            return Ok(Vec::new());
        }

        let script_dir = location
            .parent()
            .map_or_else(|| self.change.root().to_path_buf(), Path::to_path_buf);
        let input = InputApi::new(
            self.change.clone(),
            script_dir,
            self.committing,
            self.temp_files.clone(),
        );
        let value = self
            .engine
            .call_fn::<Dynamic>(&mut scope, &ast, entry_point, (input, OutputApi))
            .map_err(runtime)?;
        self.validate_return(value, location)
    }

    /// Accept `()` or an array of results; anything else breaks the contract.
    fn validate_return(&self, value: Dynamic, location: &Path) -> ScriptResult<Vec<ResultItem>> {
        let invalid = |found: String| ScriptError::InvalidReturn {
            path: location.to_path_buf(),
            entry_point: self.entry_point().to_string(),
            found,
        };
        if value.is_unit() {
            return Ok(Vec::new());
        }
        if !value.is_array() {
            return Err(invalid(self.type_name(&value)));
        }
        let elements = value
            .into_array()
            .map_err(|found| invalid(found.to_string()))?;

        let mut results = Vec::with_capacity(elements.len());
        for element in elements {
            let found = self.type_name(&element);
            match element.try_cast::<ResultItem>() {
                Some(result) => results.push(result),
                None => return Err(invalid(format!("an array containing {found}"))),
            }
        }
        Ok(results)
    }

    fn type_name(&self, value: &Dynamic) -> String {
        self.engine.map_type_name(value.type_name()).to_string()
    }
}

fn defines_entry_point(ast: &AST, name: &str) -> bool {
    ast.iter_functions()
        .any(|f| f.name == name && f.params.len() == 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Action;
    use crate::fakes::MemoryMetadataSource;
    use crate::result::Severity;

    fn executor(committing: bool) -> ScriptExecutor {
        let source = MemoryMetadataSource::new().with_file("/repo/a.txt", "x");
        let change = Change::new(
            "c",
            "Hello\nBUG=123",
            "/repo",
            [(Action::Modified, "a.txt")],
            Rc::new(source),
        );
        ScriptExecutor::new(Rc::new(change), committing, 0)
    }

    fn run(committing: bool, script: &str) -> ScriptResult<Vec<ResultItem>> {
        executor(committing).execute(script, Path::new("/repo/PRESUBMIT.rhai"))
    }

    #[test]
    fn test_entry_point_selected_by_mode() {
        let script = r#"
            fn check_change_on_upload(input, output) { [output.notify("upload")] }
            fn check_change_on_commit(input, output) { [output.notify("commit")] }
        "#;
        assert_eq!(run(false, script).unwrap()[0].message, "upload");
        assert_eq!(run(true, script).unwrap()[0].message, "commit");
    }

    #[test]
    fn test_missing_entry_point_is_empty() {
        let script = r#"fn check_change_on_upload(input, output) { [output.error("x")] }"#;
        assert!(run(true, script).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_arity_is_not_an_entry_point() {
        let script = r#"fn check_change_on_upload(input) { [input] }"#;
        assert!(run(false, script).unwrap().is_empty());
    }

    #[test]
    fn test_unit_and_empty_array_are_valid() {
        assert!(run(false, "fn check_change_on_upload(i, o) { }").unwrap().is_empty());
        assert!(run(false, "fn check_change_on_upload(i, o) { [] }").unwrap().is_empty());
    }

    #[test]
    fn test_string_return_is_contract_violation() {
        let err = run(false, r#"fn check_change_on_upload(i, o) { "foo" }"#).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn test_array_of_strings_is_contract_violation() {
        let err = run(false, r#"fn check_change_on_upload(i, o) { ["foo"] }"#).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("an array containing string"));
    }

    #[test]
    fn test_throw_is_runtime_fault() {
        let err = run(false, r#"fn check_change_on_upload(i, o) { throw "broken"; }"#).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_top_level_fault_without_entry_point() {
        let err = run(false, r#"throw "early";"#).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { .. }));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let err = run(false, "fn check_change_on_upload(i, o) {").unwrap_err();
        assert!(matches!(err, ScriptError::Compile { .. }));
    }

    #[test]
    fn test_tag_access() {
        let script = r#"
            fn check_change_on_upload(input, output) {
                let change = input.change;
                let results = [];
                if !change.FOO { results.push(output.notify("no foo")); }
                if change.BUG == "123" { results.push(output.notify("bug " + change.BUG)); }
                results.push(output.notify(change.description_text()));
                results
            }
        "#;
        let messages: Vec<String> = run(false, script)
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, ["no foo", "bug 123", "Hello"]);
    }

    #[test]
    fn test_input_api_surface() {
        let script = r#"
            fn check_change_on_upload(input, output) {
                let results = [];
                for file in input.affected_files() {
                    results.push(output.notify(file.local_path(), [file.action()]));
                }
                for line in input.right_hand_side_lines() {
                    results.push(output.prompt_warning(line[2], [line[0].local_path(), line[1]]));
                }
                results
            }
        "#;
        let results = run(false, script).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].message, "a.txt");
        assert_eq!(results[0].items, ["M"]);
        assert_eq!(results[1].severity, Severity::PromptWarning);
        assert_eq!(results[1].message, "x");
        assert_eq!(results[1].items, ["a.txt", "1"]);
    }

    #[test]
    fn test_script_print_does_not_fail() {
        let script = r#"fn check_change_on_upload(i, o) { print("hello"); debug("dbg"); }"#;
        assert!(run(false, script).unwrap().is_empty());
    }
}
