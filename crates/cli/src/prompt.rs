// Interactive resolution on the terminal
//
// Menus go to stderr so stdout stays clean for --json output. A numbered
// choice picks a candidate; letters pick the mode's fallback actions. Bad
// input re-prompts; end of input answers "no decision".

use std::io::{self, BufRead, Write};

use seatkeeper_recon::oracle::{ResolutionMode, ResolutionRequest};
use seatkeeper_recon::{ResolutionOracle, ResolutionOutcome};

pub struct TerminalOracle<R, W> {
    input: R,
    output: W,
}

impl TerminalOracle<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

/// Fallback actions offered after the numbered candidates.
fn extra_options(mode: ResolutionMode) -> &'static [(char, &'static str, Fallback)] {
    match mode {
        ResolutionMode::FieldCorrection => &[
            ('d', "Discard record", Fallback::Discard),
            ('s', "Skip (leave pending)", Fallback::Reject),
        ],
        ResolutionMode::MergeDecision => &[('n', "None of these (insert as new)", Fallback::Reject)],
        ResolutionMode::RetainOne => &[('s', "Skip (leave seat as is)", Fallback::Reject)],
        ResolutionMode::DistrictRepair => &[('n', "No match", Fallback::Reject)],
    }
}

#[derive(Clone, Copy)]
enum Fallback {
    Discard,
    Reject,
}

fn prompt_title(mode: ResolutionMode) -> &'static str {
    match mode {
        ResolutionMode::FieldCorrection => "Did you mean",
        ResolutionMode::MergeDecision => "Is this an existing legislator",
        ResolutionMode::RetainOne => "Which legislator holds this seat",
        ResolutionMode::DistrictRepair => "Which district is this",
    }
}

impl<R: BufRead, W: Write> TerminalOracle<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Read one trimmed line. `None` at end of input or on a read error.
    fn read_answer(&mut self) -> Option<String> {
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn show_menu(&mut self, request: &ResolutionRequest<'_>) {
        let extras = extra_options(request.mode);
        let _ = writeln!(self.output);
        let _ = writeln!(self.output, "{}", request.subject);
        let _ = writeln!(
            self.output,
            "{} ({} '{}')?",
            prompt_title(request.mode),
            request.field,
            request.value
        );
        for (i, candidate) in request.candidates.iter().enumerate() {
            if candidate.score > 0 {
                let _ = writeln!(self.output, "  {}. {} ({})", i + 1, candidate.value, candidate.score);
            } else {
                let _ = writeln!(self.output, "  {}. {}", i + 1, candidate.value);
            }
        }
        for (key, label, _) in extras {
            let _ = writeln!(self.output, "  {key}. {label}");
        }
        let _ = write!(self.output, "Select an option: ");
    }
}

impl<R: BufRead, W: Write> ResolutionOracle for TerminalOracle<R, W> {
    fn resolve(&mut self, request: &ResolutionRequest<'_>) -> ResolutionOutcome {
        let extras = extra_options(request.mode);
        self.show_menu(request);

        loop {
            let Some(answer) = self.read_answer() else {
                let _ = writeln!(self.output);
                return ResolutionOutcome::Reject;
            };

            if let Ok(n) = answer.parse::<usize>() {
                if let Some(candidate) = n.checked_sub(1).and_then(|i| request.candidates.get(i)) {
                    return ResolutionOutcome::Accept(candidate.value.clone());
                }
            }
            let picked = extras
                .iter()
                .find(|(key, _, _)| answer.len() == 1 && answer.eq_ignore_ascii_case(&key.to_string()));
            match picked {
                Some((_, _, Fallback::Discard)) => return ResolutionOutcome::Discard,
                Some((_, _, Fallback::Reject)) => return ResolutionOutcome::Reject,
                None => {
                    let _ = write!(self.output, "Unknown option selected. Select an option: ");
                }
            }
        }
    }

    fn provide_name(&mut self, subject: &str) -> Option<String> {
        let _ = writeln!(self.output);
        let _ = write!(self.output, "{subject} is not filled. Legislator name (blank to skip): ");
        self.read_answer().filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatkeeper_recon::model::MatchCandidate;
    use seatkeeper_recon::Field;
    use std::io::Cursor;

    fn candidates() -> Vec<MatchCandidate> {
        vec![
            MatchCandidate { value: "Bennington-1".into(), score: 91 },
            MatchCandidate { value: "Bennington-2".into(), score: 84 },
        ]
    }

    fn ask(input: &str, mode: ResolutionMode) -> (ResolutionOutcome, String) {
        let candidates = candidates();
        let request = ResolutionRequest {
            subject: "Name: Ann Bo / State: VT / District: Benn-1".into(),
            field: Field::District,
            value: "Benn-1",
            candidates: &candidates,
            mode,
        };
        let mut out = Vec::new();
        let outcome = TerminalOracle::new(Cursor::new(input.to_string()), &mut out).resolve(&request);
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_number_selects_candidate() {
        let (outcome, menu) = ask("2\n", ResolutionMode::FieldCorrection);
        assert_eq!(outcome, ResolutionOutcome::Accept("Bennington-2".into()));
        assert!(menu.contains("  1. Bennington-1 (91)"));
        assert!(menu.contains("  d. Discard record"));
    }

    #[test]
    fn test_bad_input_reprompts() {
        let (outcome, menu) = ask("7\nx\n1\n", ResolutionMode::FieldCorrection);
        assert_eq!(outcome, ResolutionOutcome::Accept("Bennington-1".into()));
        assert_eq!(menu.matches("Unknown option selected").count(), 2);
    }

    #[test]
    fn test_fallback_letters_depend_on_mode() {
        assert_eq!(ask("d\n", ResolutionMode::FieldCorrection).0, ResolutionOutcome::Discard);
        assert_eq!(ask("S\n", ResolutionMode::FieldCorrection).0, ResolutionOutcome::Reject);
        assert_eq!(ask("n\n", ResolutionMode::MergeDecision).0, ResolutionOutcome::Reject);

        // 'd' is not offered when merging, so it re-prompts until input ends
        let (outcome, menu) = ask("d\n", ResolutionMode::MergeDecision);
        assert_eq!(outcome, ResolutionOutcome::Reject);
        assert!(menu.contains("Unknown option selected"));
    }

    #[test]
    fn test_end_of_input_rejects() {
        assert_eq!(ask("", ResolutionMode::DistrictRepair).0, ResolutionOutcome::Reject);
    }

    #[test]
    fn test_provide_name() {
        let mut out = Vec::new();
        let mut oracle = TerminalOracle::new(Cursor::new("  Jo Ames \n\n".to_string()), &mut out);
        assert_eq!(oracle.provide_name("Alabama Representative District 4"), Some("Jo Ames".into()));
        assert_eq!(oracle.provide_name("Alabama Representative District 5"), None);
        assert_eq!(oracle.provide_name("Alabama Representative District 6"), None);
    }
}
