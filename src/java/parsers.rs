#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::{
    java::diagnostics::{DiagnosticSeverity, JavacLine},
    types::LineRef,
};

peg::parser! {
    /// includes some useful grammars for parsing javac and JUnit console outputs.
    pub grammar parser() for str {
        /// matches any sequence of 1 or more numbers
        rule number() -> u32
            = n:$(['0'..='9']+) {? n.parse().or(Err("u32")) }

        /// matches spaces and tabs inside a single line
        rule whitespace() = quiet!{[' ' | '\t' | '\r']+}

        /// matches "error" or "warning"
        rule severity() -> DiagnosticSeverity
            = "error" { DiagnosticSeverity::Error }
            / "warning" { DiagnosticSeverity::Warning }

        /// matches a source path up to the `:<line>:` marker
        rule path() -> &'input str
            = $((!(":" number() ":") [_])+)

        /// matches the rest of the line
        rule rest() -> &'input str
            = $([_]*)

        /// parses the first line of a javac diagnostic, eg.
        /// `src/Foo.java:3: error: ';' expected`
        pub rule javac_diagnostic() -> JavacLine
            = whitespace()? p:path() ":" l:number() ":" whitespace()? s:severity() ":" whitespace()? m:rest()
            {
                JavacLine {
                    path:     p.trim().to_string(),
                    line:     l,
                    severity: s,
                    message:  m.trim_end().to_string(),
                }
            }

        /// matches the keys javac uses for verbose follow-up lines
        rule detail_key() -> &'input str
            = $("symbol" / "location" / "required" / "found" / "reason")

        /// parses a follow-up line such as `  symbol:   variable x`
        pub rule javac_detail() -> String
            = whitespace() k:detail_key() whitespace()? ":" whitespace()? v:rest()
            { format!("{k}: {}", v.trim_end()) }

        /// matches the method part of a stack frame
        rule frame_method() = [^ '(' | ' ' | '\t']+

        /// matches a file stem inside a stack frame
        rule frame_file() -> &'input str
            = $((!".java:" [^ ')' | '(' | ' '])+)

        /// parses a LineRef from a stack frame, with or without the `at ` prefix, eg.
        /// `at FooTest.testAdd(FooTest.java:12)`
        pub rule stack_frame() -> LineRef
            = whitespace()? ("at" whitespace())? frame_method() "(" f:frame_file() ".java:" n:number() ")" whitespace()?
            {
                LineRef { line_number: n as usize, file_name: f.to_string() }
            }

        /// parses and returns the number of tests found
        pub rule tests_found() -> u32
            = "[" whitespace()? n:number() whitespace() "tests found" whitespace()? "]" { n }

        /// parses and returns the number of tests passed
        pub rule tests_successful() -> u32
            = "[" whitespace()? n:number() whitespace() "tests successful" whitespace()? "]" { n }

        /// parses and returns the number of tests failed
        pub rule tests_failed() -> u32
            = "[" whitespace()? n:number() whitespace() "tests failed" whitespace()? "]" { n }

        /// matches any line of the summary box, eg. `[   4 containers found   ]`
        pub rule summary_box()
            = "[" whitespace()? number() whitespace() ("tests" / "containers") whitespace()
              ['a'..='z']+ whitespace()? "]"

        /// parses the `Failures (N):` header of the console report
        pub rule failures_header() -> u32
            = whitespace()? "Failures" whitespace()? "(" n:number() ")" ":" whitespace()? { n }
    }
}
