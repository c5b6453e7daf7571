//! Static screening of submitted source code
//!
//! A cheap early-reject pass over the raw source text, run before any file is
//! written or any process is spawned. It is a denylist of textual patterns:
//! string concatenation, alternate APIs or encodings get past it trivially.
//! It is NOT an isolation boundary.
//!
//! Checks run in order and stop at the first hit:
//! 1. Length limit
//! 2. Forbidden constructs (dynamic loading, process access, unbounded loops,
//!    deny-listed interpreter modules)
//! 3. Restricted host-runtime module imports

use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Maximum accepted source length, in characters
pub const MAX_SOURCE_CHARS: usize = 10_000;

/// Interpreter modules that may not be imported
const DENIED_MODULES: &str =
    "os|sys|subprocess|shlex|pickle|socket|threading|multiprocessing|pty|resource|pwd|grp";

/// Host-runtime modules that may not be imported or required
const RESTRICTED_MODULES: &str = "fs|os|net|child_process";

/// Kind of forbidden construct found in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    DynamicLoading,
    ProcessAccess,
    UnboundedLoop,
    DeniedModule,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::DynamicLoading => "dynamic module loading",
            Category::ProcessAccess => "process access",
            Category::UnboundedLoop => "unbounded loop",
            Category::DeniedModule => "denied module import",
        };
        write!(f, "{}", s)
    }
}

/// Why a submission was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Source code exceeds the maximum length of {limit} characters ({length} given)")]
    TooLong { length: usize, limit: usize },

    #[error("Forbidden construct ({category}): `{matched}`")]
    ForbiddenConstruct { category: Category, matched: String },

    #[error("Restricted module import: {module}")]
    RestrictedModule { module: String },
}

struct Rule {
    category: Category,
    pattern: Regex,
}

/// Compiled denylist
pub struct Screener {
    max_chars: usize,
    rules: Vec<Rule>,
    restricted: Vec<Regex>,
}

impl Screener {
    pub fn new() -> Result<Self, regex::Error> {
        let rule = |category, pattern: &str| -> Result<Rule, regex::Error> {
            Ok(Rule {
                category,
                pattern: Regex::new(pattern)?,
            })
        };

        let rules = vec![
            rule(Category::DynamicLoading, r"\brequire\s*\(")?,
            rule(Category::DynamicLoading, r"\b__import__\s*\(")?,
            rule(Category::ProcessAccess, r"\bprocess\.")?,
            rule(Category::ProcessAccess, r"child_process")?,
            rule(Category::ProcessAccess, r"\bexec\s*\(")?,
            rule(Category::UnboundedLoop, r"\bwhile\s*\(\s*true\s*\)")?,
            rule(Category::UnboundedLoop, r"\bfor\s*\(\s*;\s*;\s*\)")?,
            // import os / import json, os.path as p
            rule(
                Category::DeniedModule,
                &format!(
                    r"(?m)^\s*import\s+(?:[\w.]+(?:\s+as\s+\w+)?\s*,\s*)*(?:{})\b",
                    DENIED_MODULES
                ),
            )?,
            // from os import path / from os.path import join
            rule(
                Category::DeniedModule,
                &format!(r"(?m)^\s*from\s+(?:{})(?:\.[\w.]+)?\s+import\b", DENIED_MODULES),
            )?,
        ];

        let restricted = vec![
            // import fs from 'fs' / import { readFile } from "node:fs" / import 'net'
            Regex::new(&format!(
                r#"\bimport\s+(?:[\w*{{}}\s,]+?\s+from\s+)?['"](?:node:)?({})['"]"#,
                RESTRICTED_MODULES
            ))?,
            Regex::new(&format!(
                r#"\brequire\s*\(\s*['"](?:node:)?({})['"]\s*\)"#,
                RESTRICTED_MODULES
            ))?,
        ];

        Ok(Self {
            max_chars: MAX_SOURCE_CHARS,
            rules,
            restricted,
        })
    }

    /// Check a submission, returning the first reason to refuse it
    pub fn screen(&self, source_code: &str) -> Result<(), Rejection> {
        let length = source_code.chars().count();
        if length > self.max_chars {
            return Err(Rejection::TooLong {
                length,
                limit: self.max_chars,
            });
        }

        for rule in &self.rules {
            if let Some(m) = rule.pattern.find(source_code) {
                return Err(Rejection::ForbiddenConstruct {
                    category: rule.category,
                    matched: m.as_str().trim().to_string(),
                });
            }
        }

        for pattern in &self.restricted {
            if let Some(caps) = pattern.captures(source_code) {
                let module = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                return Err(Rejection::RestrictedModule {
                    module: module.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screener() -> Screener {
        Screener::new().unwrap()
    }

    fn category_of(code: &str) -> Option<Category> {
        match screener().screen(code) {
            Err(Rejection::ForbiddenConstruct { category, .. }) => Some(category),
            _ => None,
        }
    }

    #[test]
    fn test_accepts_ordinary_programs() {
        let s = screener();
        assert!(s.screen("print(input())").is_ok());
        assert!(s
            .screen("#include <bits/stdc++.h>\nint main() { std::string s; std::getline(std::cin, s); }")
            .is_ok());
        assert!(s
            .screen("import java.util.*;\npublic class Program { public static void main(String[] a) {} }")
            .is_ok());
        assert!(s.screen("import math\nimport collections\nwhile True:\n    pass\n").is_ok());
        assert!(s.screen("import osmosis").is_ok());
    }

    #[test]
    fn test_length_limit() {
        let s = screener();
        let at_limit = "a".repeat(MAX_SOURCE_CHARS);
        assert!(s.screen(&at_limit).is_ok());

        let over = "a".repeat(MAX_SOURCE_CHARS + 1);
        assert_eq!(
            s.screen(&over),
            Err(Rejection::TooLong {
                length: MAX_SOURCE_CHARS + 1,
                limit: MAX_SOURCE_CHARS
            })
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let s = screener();
        // 3 bytes per char in UTF-8
        let wide = "가".repeat(MAX_SOURCE_CHARS);
        assert!(s.screen(&wide).is_ok());
    }

    #[test]
    fn test_length_checked_before_patterns() {
        let code = format!("exec('x')\n{}", "#".repeat(MAX_SOURCE_CHARS));
        assert!(matches!(
            screener().screen(&code),
            Err(Rejection::TooLong { .. })
        ));
    }

    #[test]
    fn test_dynamic_loading() {
        assert_eq!(category_of("const x = require('lodash')"), Some(Category::DynamicLoading));
        assert_eq!(category_of("m = __import__('os')"), Some(Category::DynamicLoading));
    }

    #[test]
    fn test_process_access() {
        assert_eq!(category_of("process.exit(1)"), Some(Category::ProcessAccess));
        assert_eq!(category_of("exec ('print(1)')"), Some(Category::ProcessAccess));
        assert_eq!(
            category_of("Runtime.getRuntime().exec(\"ls\");"),
            Some(Category::ProcessAccess)
        );
    }

    #[test]
    fn test_unbounded_loops() {
        assert_eq!(category_of("while(true){}"), Some(Category::UnboundedLoop));
        assert_eq!(category_of("while ( true ) {}"), Some(Category::UnboundedLoop));
        assert_eq!(category_of("for(;;){}"), Some(Category::UnboundedLoop));
        assert_eq!(category_of("for ( ; ; ) {}"), Some(Category::UnboundedLoop));
        assert_eq!(category_of("for (int i = 0; i < n; i++) {}"), None);
    }

    #[test]
    fn test_denied_interpreter_modules() {
        assert_eq!(category_of("import os"), Some(Category::DeniedModule));
        assert_eq!(category_of("  import sys"), Some(Category::DeniedModule));
        assert_eq!(category_of("import json, subprocess"), Some(Category::DeniedModule));
        assert_eq!(category_of("import os.path as p"), Some(Category::DeniedModule));
        assert_eq!(category_of("from socket import socket"), Some(Category::DeniedModule));
        assert_eq!(category_of("from os.path import join"), Some(Category::DeniedModule));
        assert_eq!(category_of("import pwd\n"), Some(Category::DeniedModule));
        assert_eq!(category_of("from sysconfig import x"), None);
    }

    #[test]
    fn test_restricted_host_modules() {
        let s = screener();
        assert_eq!(
            s.screen("import fs from 'fs';"),
            Err(Rejection::RestrictedModule {
                module: "fs".to_string()
            })
        );
        assert_eq!(
            s.screen("import { connect } from \"node:net\";"),
            Err(Rejection::RestrictedModule {
                module: "net".to_string()
            })
        );
        assert_eq!(
            s.screen("import 'os';"),
            Err(Rejection::RestrictedModule {
                module: "os".to_string()
            })
        );
    }

    #[test]
    fn test_require_of_host_module_reports_first_match() {
        // Dynamic loading is checked before the restricted-module pass
        assert_eq!(category_of("const fs = require('fs')"), Some(Category::DynamicLoading));
    }

    #[test]
    fn test_rejection_messages() {
        let err = screener().screen("import os").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden construct (denied module import): `import os`"
        );

        let err = screener().screen("import net from 'net'").unwrap_err();
        assert_eq!(err.to_string(), "Restricted module import: net");

        let err = screener().screen("while (true) {}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden construct (unbounded loop): `while (true)`"
        );

        let err = screener().screen(&"a".repeat(MAX_SOURCE_CHARS + 5)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Source code exceeds the maximum length of 10000 characters (10005 given)"
        );
    }
}
