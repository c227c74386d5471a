use std::collections::HashMap;

use regex::Regex;

use crate::GradeRecord;

/// A module code such as `I169`: one uppercase letter followed by digits.
const MODULE_ID_PATTERN: &str = r"^[A-Z][0-9]+$";

/// Lines that start the closing boilerplate of a transcript; nothing after them is grade data.
const FOOTER_PREFIXES: [&str; 2] = [
    "Diese Notenübersicht ist kein Zeugnis",
    "Der derzeitige Notendurchschnitt",
];

const HEADER_TOKENS: [&str; 4] = ["Credits", "Note", "Name", "ModulNr"];
const CREDIT_SUFFIX: &str = " CP";

const MISSING_GRADE: &str = "?";
const UNKNOWN_MODULE: &str = "Unknown";

/// Recoverable irregularities found while parsing. None of them stop the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAnomaly {
    /// A module block closed without any grade fragments; its grade is `"?"`.
    MissingGrade {
        module: String,
        occurrence_index: u32,
    },
    /// A module code was the last line of the text; the module is named `"Unknown"`.
    MissingModuleName { module_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranscriptParse {
    pub records: Vec<GradeRecord>,
    pub anomalies: Vec<ParseAnomaly>,
    /// True when the scan stopped at a footer line rather than at end of input.
    pub footer_reached: bool,
}

/// Line-oriented transcript parser.
///
/// Each module block starts at a module-code line, takes the next line as the
/// module name and collects the following lines as grade fragments until the
/// next module code or a footer line.
#[derive(Debug, Clone)]
pub struct GradeParser {
    module_id: Regex,
}

impl Default for GradeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GradeParser {
    pub fn new() -> Self {
        Self {
            module_id: Regex::new(MODULE_ID_PATTERN).expect("module id pattern is valid"),
        }
    }

    pub fn parse(&self, text: &str) -> Vec<GradeRecord> {
        self.parse_detailed(text).records
    }

    pub fn parse_detailed(&self, text: &str) -> TranscriptParse {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let mut scan = Scan::default();

        while let Some(line) = lines.next() {
            if self.module_id.is_match(line) {
                scan.close_block();
                let name = match lines.next() {
                    Some(name) => name.to_string(),
                    None => {
                        scan.out.anomalies.push(ParseAnomaly::MissingModuleName {
                            module_id: line.to_string(),
                        });
                        UNKNOWN_MODULE.to_string()
                    }
                };
                scan.open = Some(OpenBlock {
                    module: name,
                    fragments: Vec::new(),
                });
                continue;
            }

            if is_footer(line) {
                scan.out.footer_reached = true;
                break;
            }
            if is_noise(line) {
                continue;
            }
            if let Some(block) = scan.open.as_mut() {
                block.fragments.push(line);
            }
        }

        scan.close_block();
        scan.out
    }
}

struct OpenBlock<'a> {
    module: String,
    fragments: Vec<&'a str>,
}

#[derive(Default)]
struct Scan<'a> {
    open: Option<OpenBlock<'a>>,
    // Next occurrence index per module name; local to one parse call.
    occurrences: HashMap<String, u32>,
    out: TranscriptParse,
}

impl Scan<'_> {
    fn close_block(&mut self) {
        let Some(block) = self.open.take() else {
            return;
        };

        let counter = self.occurrences.entry(block.module.clone()).or_insert(0);
        let occurrence_index = *counter;
        *counter += 1;

        let grade = if block.fragments.is_empty() {
            self.out.anomalies.push(ParseAnomaly::MissingGrade {
                module: block.module.clone(),
                occurrence_index,
            });
            MISSING_GRADE.to_string()
        } else {
            block.fragments.join(" ")
        };

        self.out.records.push(GradeRecord {
            module: block.module,
            grade,
            occurrence_index,
        });
    }
}

fn is_footer(line: &str) -> bool {
    FOOTER_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

fn is_noise(line: &str) -> bool {
    line.ends_with(CREDIT_SUFFIX) || HEADER_TOKENS.contains(&line)
}
