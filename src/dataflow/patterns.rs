//! Pattern catalogs for the native scanning engine.
//!
//! The catalogs are pure data: ordered tables of (category, regex,
//! description) rows for sources and sinks, one combined sanitizer regex,
//! and the nil-producing-expression patterns. Adding a signature means
//! adding a row here; the scanning and tracking logic never changes.
//!
//! Order within a category affects diagnostic ordering only, never
//! correctness.

use regex::Regex;

use super::types::{SinkKind, SourceKind};

/// A pattern detecting an untrusted data source.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pub kind: SourceKind,
    pub pattern: Regex,
    pub description: &'static str,
}

/// A pattern detecting a sensitive data sink.
#[derive(Debug, Clone)]
pub struct SinkPattern {
    pub kind: SinkKind,
    pub pattern: Regex,
    pub description: &'static str,
}

const SOURCE_TABLE: &[(SourceKind, &str, &str)] = &[
    // HTTP body
    (SourceKind::HttpBody, r"(?:r|req|request)\.Body", "HTTP request body"),
    (
        SourceKind::HttpBody,
        r"json\.(?:NewDecoder|Unmarshal)\s*\(",
        "JSON decode from request",
    ),
    (
        SourceKind::HttpBody,
        r"ioutil\.ReadAll\s*\(\s*(?:r|req|request)\.Body",
        "Read all from request body",
    ),
    (
        SourceKind::HttpBody,
        r"io\.ReadAll\s*\(\s*(?:r|req|request)\.Body",
        "Read all from request body",
    ),
    (SourceKind::HttpBody, r"c\.(?:Body|BodyParser|Bind)\s*\(", "Fiber body binding"),
    // HTTP query parameters
    (
        SourceKind::HttpQuery,
        r"(?:r|req|request)\.URL\.Query\s*\(\)",
        "URL query parameters",
    ),
    (
        SourceKind::HttpQuery,
        r"(?:r|req|request)\.FormValue\s*\(",
        "Form value from request",
    ),
    (
        SourceKind::HttpQuery,
        r"(?:r|req|request)\.Form\.Get\s*\(",
        "Form.Get from request",
    ),
    (
        SourceKind::HttpQuery,
        r"(?:query|params|values|form)\.Get\s*\(",
        "Query values lookup",
    ),
    (SourceKind::HttpQuery, r"c\.Query\s*\(", "Fiber query parameter"),
    (SourceKind::HttpQuery, r"c\.QueryParam\s*\(", "Echo query parameter"),
    // HTTP headers
    (
        SourceKind::HttpHeader,
        r"(?:r|req|request)\.Header\.Get\s*\(",
        "HTTP header value",
    ),
    (SourceKind::HttpHeader, r"(?:r|req|request)\.Header\[", "HTTP header access"),
    (SourceKind::HttpHeader, r#"c\.Get\s*\(\s*["']"#, "Fiber header get"),
    // HTTP path parameters
    (
        SourceKind::HttpPath,
        r"(?:mux\.)?Vars\s*\(\s*(?:r|req|request)\s*\)",
        "URL path variable (gorilla/mux)",
    ),
    (SourceKind::HttpPath, r"chi\.URLParam\s*\(", "URL parameter (chi)"),
    (SourceKind::HttpPath, r"c\.Params\s*\(", "Fiber path parameter"),
    (SourceKind::HttpPath, r"c\.Param\s*\(", "Echo/Gin path parameter"),
    // Environment variables
    (SourceKind::EnvVar, r"os\.Getenv\s*\(", "Environment variable read"),
    (SourceKind::EnvVar, r"os\.LookupEnv\s*\(", "Environment variable lookup"),
    (
        SourceKind::EnvVar,
        r"viper\.(?:Get|GetString|GetInt)\s*\(",
        "Viper config read",
    ),
    // File system
    (SourceKind::FileRead, r"os\.(?:Open|ReadFile)\s*\(", "File open/read"),
    (SourceKind::FileRead, r"ioutil\.ReadFile\s*\(", "File read (ioutil)"),
    (SourceKind::FileRead, r"io\.(?:ReadAll|Copy)\s*\(", "IO read operation"),
    (SourceKind::FileRead, r"bufio\.NewReader\s*\(", "Buffered reader"),
    // Database
    (
        SourceKind::Database,
        r"\.Query(?:Row|Context)?\s*\(",
        "Database query result",
    ),
    (SourceKind::Database, r"\.Scan\s*\(", "Database scan result"),
    (SourceKind::Database, r"\.Find(?:One|All|By)?\s*\(", "ORM find operation"),
    (SourceKind::Database, r"\.First\s*\(", "GORM first query"),
    (
        SourceKind::Database,
        r"collection\.(?:Find|FindOne)\s*\(",
        "MongoDB query",
    ),
    // External API
    (SourceKind::ExternalApi, r"http\.(?:Get|Post|Do)\s*\(", "HTTP client request"),
    (SourceKind::ExternalApi, r"client\.(?:Get|Post|Do)\s*\(", "HTTP client call"),
    (SourceKind::ExternalApi, r"\.(?:Response|Body)\.", "HTTP response body"),
    // Console input
    (
        SourceKind::UserInput,
        r"bufio\.NewScanner\s*\(\s*os\.Stdin",
        "Stdin scanner",
    ),
    (SourceKind::UserInput, r"fmt\.Scan(?:f|ln)?\s*\(", "Console input"),
];

const SINK_TABLE: &[(SinkKind, &str, &str)] = &[
    // Database operations
    (
        SinkKind::Database,
        r"\.Exec(?:Context)?\s*\(",
        "SQL exec (potential injection)",
    ),
    (
        SinkKind::Database,
        r"\.Query(?:Row)?(?:Context)?\s*\([^,]*\+",
        "SQL query with concatenation",
    ),
    (
        SinkKind::Database,
        r"fmt\.Sprintf\s*\([^)]*(?:SELECT|INSERT|UPDATE|DELETE)",
        "SQL string formatting",
    ),
    (
        SinkKind::Database,
        r"collection\.(?:InsertOne|UpdateOne|DeleteOne)\s*\(",
        "MongoDB write operation",
    ),
    // Command execution
    (SinkKind::CommandExec, r"exec\.Command\s*\(", "OS command execution"),
    (SinkKind::CommandExec, r"exec\.CommandContext\s*\(", "OS command with context"),
    (SinkKind::CommandExec, r"os\.StartProcess\s*\(", "OS process start"),
    (SinkKind::CommandExec, r"syscall\.Exec\s*\(", "Syscall exec"),
    // HTTP response
    (
        SinkKind::HttpResponse,
        r"(?:w|rw|writer|response)\.Write\s*\(",
        "HTTP response write",
    ),
    (
        SinkKind::HttpResponse,
        r"(?:w|rw|writer|response)\.WriteString\s*\(",
        "HTTP response write string",
    ),
    (
        SinkKind::HttpResponse,
        r"fmt\.Fprint(?:f|ln)?\s*\(\s*(?:w|rw|writer)",
        "Printf to response writer",
    ),
    (
        SinkKind::HttpResponse,
        r"json\.NewEncoder\s*\(\s*(?:w|rw|writer)",
        "JSON encode to response",
    ),
    (
        SinkKind::HttpResponse,
        r"c\.(?:JSON|Send|Write|Status)\s*\(",
        "Fiber response",
    ),
    (SinkKind::HttpResponse, r"c\.(?:String|HTML|XML)\s*\(", "Echo/Gin response"),
    // Logging
    (
        SinkKind::Logging,
        r"log\.(?:Print|Printf|Println|Fatal|Fatalf)\s*\(",
        "Standard log output",
    ),
    (
        SinkKind::Logging,
        r"logger\.(?:Info|Warn|Error|Debug|Fatal)(?:f|w)?\s*\(",
        "Structured logger",
    ),
    (
        SinkKind::Logging,
        r"zap\.(?:L|S)\(\)\.(?:Info|Warn|Error|Debug)\s*\(",
        "Zap logger",
    ),
    (
        SinkKind::Logging,
        r"logrus\.(?:Info|Warn|Error|Debug|Fatal)(?:f)?\s*\(",
        "Logrus logger",
    ),
    (SinkKind::Logging, r"slog\.(?:Info|Warn|Error|Debug)\s*\(", "Slog logger"),
    // File operations
    (SinkKind::FileWrite, r"os\.(?:WriteFile|Create)\s*\(", "File write/create"),
    (SinkKind::FileWrite, r"ioutil\.WriteFile\s*\(", "File write (ioutil)"),
    (
        SinkKind::FileWrite,
        r"(?:f|file)\.Write(?:String)?\s*\(",
        "File handle write",
    ),
    (SinkKind::FileWrite, r"io\.(?:Copy|WriteString)\s*\(", "IO write operation"),
    // Template rendering
    (
        SinkKind::Template,
        r"template\.(?:HTML|JS|CSS)\s*\(",
        "Template type conversion",
    ),
    (SinkKind::Template, r"\.Execute(?:Template)?\s*\(", "Template execution"),
    (SinkKind::Template, r"html/template.*Execute", "HTML template execute"),
    // Redirects
    (SinkKind::Redirect, r"http\.Redirect\s*\(", "HTTP redirect"),
    (SinkKind::Redirect, r"c\.Redirect\s*\(", "Fiber/Echo redirect"),
    (
        SinkKind::Redirect,
        r#"(?:w|rw)\.Header\(\)\.Set\s*\(\s*"Location""#,
        "Location header redirect",
    ),
];

const SANITIZER_ALTERNATIVES: &[&str] = &[
    r"html\.EscapeString",
    r"url\.QueryEscape",
    r"url\.PathEscape",
    r"strconv\.(?:Atoi|ParseInt|ParseFloat|ParseBool)",
    r"regexp\.MustCompile.*MatchString",
    r"strings\.(?:TrimSpace|ReplaceAll)",
    r"template\.(?:HTMLEscapeString|JSEscapeString)",
    r"sanitize\w*",
    r"escape\w*",
    r"validate\w*",
    r"clean\w*",
    r"filter\w*",
    r"whitelist\w*",
    r"sql\.Named",
    r"pgx\.NamedArgs",
];

const NIL_TABLE: &[&str] = &[
    // Map lookups
    r"(\w+)\s*(?:,\s*(?:ok|_))?\s*:?=\s*\w+\[",
    // Database query results
    r"(\w+)\s*,\s*err\s*:?=\s*(?:db|tx|conn)\.(?:Query|QueryRow|Exec)",
    // Type assertions
    r"(\w+)\s*(?:,\s*(?:ok|_))?\s*:?=\s*\w+\.\(\w+\)",
    // JSON unmarshal targets
    r"json\.Unmarshal\s*\([^,]+,\s*&?(\w+)\)",
    // Lookup-style calls returning optionals/pointers
    r"(\w+)\s*:?=\s*\*?\w+\.(?:Find|Get|Load|Lookup)\w*\s*\(",
    // Interface type assertions
    r"(\w+)\s*,\s*ok\s*:?=\s*\w+\.\(interface\{\}\)",
    // Context value extraction
    r"(\w+)\s*(?:,\s*(?:ok|_))?\s*:?=\s*(?:ctx|context)\.Value\s*\(",
    // Channel receive
    r"(\w+)\s*(?:,\s*(?:ok|_))?\s*:?=\s*<-\s*\w+",
];

/// Source patterns in catalog order.
#[must_use]
pub fn source_patterns() -> Vec<SourcePattern> {
    SOURCE_TABLE
        .iter()
        .filter_map(|&(kind, pattern, description)| {
            Some(SourcePattern {
                kind,
                pattern: Regex::new(pattern).ok()?,
                description,
            })
        })
        .collect()
}

/// Sink patterns in catalog order.
#[must_use]
pub fn sink_patterns() -> Vec<SinkPattern> {
    SINK_TABLE
        .iter()
        .filter_map(|&(kind, pattern, description)| {
            Some(SinkPattern {
                kind,
                pattern: Regex::new(pattern).ok()?,
                description,
            })
        })
        .collect()
}

/// One combined case-insensitive regex matching recognized sanitizers:
/// escaping, type coercion, validation/cleaning helpers, and
/// parameterized-query constructors.
#[must_use]
pub fn sanitizer_regex() -> Regex {
    let joined = format!("(?i)(?:{})", SANITIZER_ALTERNATIVES.join("|"));
    // The alternatives are a fixed table; fall back to a never-matching
    // pattern rather than panicking if a row is ever broken.
    Regex::new(&joined).unwrap_or_else(|_| Regex::new(r"\bunmatchable\b$").expect("literal regex"))
}

/// Patterns whose first capture group binds a potentially nil variable.
#[must_use]
pub fn nil_patterns() -> Vec<Regex> {
    NIL_TABLE
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}
