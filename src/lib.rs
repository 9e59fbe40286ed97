//! # siemql
//!
//! A detection-rule compiler: parses Sigma-style detection rules and
//! externally constructed YARA-style rule expressions and translates both
//! into backend query strings, with layered backend configs supplying index
//! routing, log-source rewrites, and field mappings.
//!
//! ## Quick Start
//!
//! ### Compiling a detection rule
//!
//! ```rust,ignore
//! use siemql::{CompileContext, sigma};
//!
//! let rule = sigma::parse_rule(r#"
//! title: Suspicious Service Install
//! logsource:
//!     product: windows
//!     service: sysmon
//! detection:
//!     selection:
//!         EventID: 7045
//!         ImagePath|contains: '\temp\'
//!     condition: selection
//! "#)?;
//!
//! let config = sigma::parse_config(r#"
//! title: Windows Backend
//! fieldmappings:
//!     ImagePath: image_path
//! "#)?;
//!
//! let output = sigma::RuleEvaluator::for_rule(&rule)
//!     .with_configs(std::slice::from_ref(&config))
//!     .compile(&CompileContext::new())?;
//! for query in output.queries.values() {
//!     println!("{}", query.query);
//! }
//! # Ok::<(), siemql::TranspileError>(())
//! ```
//!
//! ### Compiling an externally parsed rule
//!
//! ```rust,ignore
//! use siemql::{CompileContext, yara};
//!
//! // The expression AST comes from the caller's own rule parser.
//! let rule = yara::Rule {
//!     identifier: "example".to_string(),
//!     condition: yara::Expression::StringIdentifier("cmd".to_string()),
//!     // ...
//! #   tags: vec![], global: false, private: false, meta: vec![],
//! #   strings: vec![],
//! };
//!
//! let output = yara::RuleEvaluator::for_rule(&rule)
//!     .compile(&CompileContext::new())?;
//! println!("{}", output.query);
//! # Ok::<(), siemql::TranspileError>(())
//! ```
//!
//! ### Batch Processing
//!
//! ```rust,ignore
//! use siemql::{batch, CompileContext};
//!
//! let ctx = CompileContext::new();
//! let results = batch::compile_rules(&ctx, &rules, &configs, Default::default());
//! let compiled = results.iter().filter(|r| r.is_ok()).count();
//! println!("compiled {compiled} of {} rules", rules.len());
//! ```

pub mod batch;
pub mod context;
pub mod error;
mod glob;
pub mod sigma;
pub mod yara;

pub use batch::{compile_rule_set, compile_rules, BatchOptions};
pub use context::{CancelHandle, CompileContext, PlaceholderExpander};
pub use error::{Result, TranspileError};
