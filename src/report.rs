//! Rendering of the pull request comment.

use std::fmt::Write;

use crate::clock::Timestamp;
use crate::error::{HectorError, Result};
use crate::model::{CoverageSummary, DiffCoverageSummary, FileCoverageStat};

/// Maximum number of impacted files listed before the rest are summarized.
pub const MAX_FILE_LINES: usize = 10;

/// Field width of the per-file coverage percentage.
pub const PERCENT_WIDTH: usize = 5;

const FAILED_EMOJI: &str = "❗️";
const PASSED_EMOJI: &str = "✅";

/// Placeholder substituted with the commit id in the review link template.
const COMMIT_PLACEHOLDER: &str = "{commit}";

/// Everything the renderer needs besides the two summaries.
pub struct RenderContext<'a> {
    /// Exit code of the coverage gate; nonzero marks the report as failed.
    pub exit_code: i32,
    /// Commit URL, either containing `{commit}` or a prefix the commit id is appended to.
    pub review_link_template: String,
    /// Link to the full coverage report, used verbatim.
    pub build_link_template: String,
    pub commit_id: String,
    pub timestamp: &'a dyn Timestamp,
}

impl RenderContext<'_> {
    /// The commit link shown in the footer.
    #[must_use]
    pub fn commit_link(&self) -> String {
        let template = &self.review_link_template;
        if template.contains(COMMIT_PLACEHOLDER) {
            template.replace(COMMIT_PLACEHOLDER, &self.commit_id)
        } else {
            format!("{}/{}", template.trim_end_matches('/'), self.commit_id)
        }
    }
}

fn status_emoji(exit_code: i32) -> &'static str {
    if exit_code != 0 {
        FAILED_EMOJI
    } else {
        PASSED_EMOJI
    }
}

/// Render the full comment.
///
/// Fails with [`HectorError::MissingData`] unless both summaries are present.
pub fn render(
    cov: Option<&CoverageSummary>,
    diff_cov: Option<&DiffCoverageSummary>,
    ctx: &RenderContext<'_>,
) -> Result<String> {
    let cov = cov.ok_or(HectorError::MissingData("coverage summary"))?;
    let diff_cov = diff_cov.ok_or(HectorError::MissingData("diff coverage summary"))?;

    let mut md = String::new();

    let diff_pct = diff_cov.diff_coverage_percent();
    let emoji = status_emoji(ctx.exit_code);
    writeln!(md, "## 📈 Diff Coverage {diff_pct:.2}% {emoji}\n").unwrap();

    let overall_pct = cov.overall_coverage_percent;
    let covered = diff_cov.covered_lines();
    let missing = diff_cov.violated_lines();
    writeln!(
        md,
        "##### Overall Coverage {overall_pct:.2}% | Covered Lines {covered} | Missing {missing}\n"
    )
    .unwrap();

    if missing != 0 {
        write_file_stats(&mut md, diff_cov.per_file_stats(), &ctx.build_link_template);
    }

    let commit_link = ctx.commit_link();
    let timestamp = ctx.timestamp.timestamp();
    writeln!(
        md,
        "###### 📝 Reported on commit [{commit_link}]({commit_link}){{: data-inline-card='' }} | {timestamp}"
    )
    .unwrap();

    Ok(md)
}

/// Append the impacted-files section: a fenced listing of the least covered
/// files followed by a link to the full report.
fn write_file_stats(md: &mut String, stats: &[(String, FileCoverageStat)], build_link: &str) {
    let impacted: Vec<&(String, FileCoverageStat)> = stats
        .iter()
        .filter(|(_, stat)| stat.percent_covered < 100.0)
        .collect();

    md.push_str("📂 Impacted Files\n\n");
    md.push_str("```sh\n");
    for (path, stat) in impacted.iter().take(MAX_FILE_LINES) {
        writeln!(md, "{}", format_file_line(path, stat)).unwrap();
    }
    md.push_str("```\n\n");

    if impacted.len() > MAX_FILE_LINES {
        let omitted = impacted.len() - MAX_FILE_LINES;
        writeln!(
            md,
            "> _{omitted}_ more files [Full Coverage Report]({build_link})\n"
        )
        .unwrap();
    } else {
        writeln!(md, "> Check [Full Coverage Report]({build_link})\n").unwrap();
    }
}

/// One row of the impacted-files listing, e.g. `❗️ 50.00% | a.py 1-3, 10`.
#[must_use]
pub fn format_file_line(path: &str, stat: &FileCoverageStat) -> String {
    let pct = stat.percent_covered;
    let width = PERCENT_WIDTH;
    let mut line = format!("{FAILED_EMOJI} {pct:>width$.2}% | {path}");
    let ranges = format_line_ranges(&stat.violation_lines);
    if !ranges.is_empty() {
        line.push(' ');
        line.push_str(&ranges);
    }
    line
}

/// Coalesce sorted line numbers into `(start, end)` runs of consecutive lines.
///
/// `lines` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32]) -> Vec<(u32, u32)> {
    if lines.is_empty() {
        return Vec::new();
    }

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce_ranges requires sorted, deduplicated input"
    );

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut start = lines[0];
    let mut end = lines[0];

    for &line in &lines[1..] {
        if line == end + 1 {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1-3, 5, 7-8, 10".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    coalesce_ranges(lines)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const FIXED_TIME: &str = "04:05 PM UTC+05:30, Friday, 01 March 2024";

    struct FixedClock;

    impl Timestamp for FixedClock {
        fn timestamp(&self) -> String {
            FIXED_TIME.to_string()
        }
    }

    fn ctx(exit_code: i32) -> RenderContext<'static> {
        RenderContext {
            exit_code,
            review_link_template: "https://bitbucket.org/acme/shop/commits/{commit}".to_string(),
            build_link_template: "https://bitbucket.org/acme/shop/pipelines/results/7".to_string(),
            commit_id: "abc1234".to_string(),
            timestamp: &FixedClock,
        }
    }

    fn stat(percent_covered: f64, violation_lines: &[u32]) -> FileCoverageStat {
        FileCoverageStat {
            percent_covered,
            violation_lines: violation_lines.to_vec(),
        }
    }

    fn diff_with_files(count: usize) -> DiffCoverageSummary {
        let files = (0..count)
            .map(|i| (format!("pkg/mod_{i:02}.py"), stat(i as f64, &[1])))
            .collect();
        DiffCoverageSummary::new(10.0, 100, count as u64, files).unwrap()
    }

    fn cov(pct: f64) -> CoverageSummary {
        CoverageSummary {
            overall_coverage_percent: pct,
        }
    }

    /// Expand "1-3, 5" back into [1, 2, 3, 5].
    fn expand(ranges: &str) -> Vec<u32> {
        if ranges.is_empty() {
            return vec![];
        }
        ranges
            .split(", ")
            .flat_map(|token| match token.split_once('-') {
                Some((a, b)) => (a.parse::<u32>().unwrap()..=b.parse().unwrap()).collect(),
                None => vec![token.parse().unwrap()],
            })
            .collect()
    }

    // -- coalesce_ranges / format_line_ranges --------------------------------

    #[test]
    fn test_coalesce_ranges_empty() {
        assert_eq!(coalesce_ranges(&[]), Vec::<(u32, u32)>::new());
    }

    #[test]
    fn test_coalesce_ranges_mixed() {
        assert_eq!(
            coalesce_ranges(&[1, 2, 3, 5, 7, 8, 10]),
            vec![(1, 3), (5, 5), (7, 8), (10, 10)]
        );
    }

    #[test]
    fn test_format_line_ranges_empty() {
        assert_eq!(format_line_ranges(&[]), "");
    }

    #[test]
    fn test_format_line_ranges_single() {
        assert_eq!(format_line_ranges(&[5]), "5");
    }

    #[test]
    fn test_format_line_ranges_adjacent_pair() {
        assert_eq!(format_line_ranges(&[4, 5]), "4-5");
    }

    #[test]
    fn test_format_line_ranges_gap_pair() {
        assert_eq!(format_line_ranges(&[4, 6]), "4, 6");
    }

    #[test]
    fn test_format_line_ranges_mixed() {
        assert_eq!(
            format_line_ranges(&[1, 2, 3, 5, 7, 8, 10]),
            "1-3, 5, 7-8, 10"
        );
    }

    #[test]
    fn test_format_line_ranges_expands_back() {
        let inputs: [&[u32]; 6] = [
            &[],
            &[0],
            &[0, 1, 2],
            &[3, 9, 10, 11, 40],
            &[1, 3, 5, 7],
            &[100, 101, 102, 104, 105, 200],
        ];
        for lines in inputs {
            assert_eq!(expand(&format_line_ranges(lines)), lines);
        }
    }

    proptest! {
        #[test]
        fn format_line_ranges_expands_to_input(set in prop::collection::btree_set(0u32..500, 0..60)) {
            let lines: Vec<u32> = set.into_iter().collect();
            prop_assert_eq!(expand(&format_line_ranges(&lines)), lines);
        }

        #[test]
        fn coalesced_runs_are_maximal(set in prop::collection::btree_set(any::<u32>(), 0..40)) {
            let lines: Vec<u32> = set.iter().copied().collect();
            let ranges = coalesce_ranges(&lines);
            for pair in ranges.windows(2) {
                prop_assert!(u64::from(pair[1].0) > u64::from(pair[0].1) + 1);
            }
            let covered: BTreeSet<u32> = ranges.iter().flat_map(|&(a, b)| a..=b).collect();
            prop_assert_eq!(covered, set);
        }
    }

    // -- render ---------------------------------------------------------------

    #[test]
    fn test_render_every_changed_line_violated() {
        let diff = DiffCoverageSummary::new(
            0.0,
            3,
            3,
            vec![("a.py".to_string(), stat(0.0, &[1, 2, 3]))],
        )
        .unwrap();
        let md = render(Some(&cov(50.0)), Some(&diff), &ctx(1)).unwrap();
        assert!(md.contains("Covered Lines 0 | Missing 3"));
        assert!(md.contains("| a.py 1-3\n"));
    }

    #[test]
    fn test_render_requires_both_summaries() {
        let diff = diff_with_files(1);
        let err = render(None, Some(&diff), &ctx(0)).unwrap_err();
        assert!(matches!(err, HectorError::MissingData("coverage summary")));

        let err = render(Some(&cov(50.0)), None, &ctx(0)).unwrap_err();
        assert!(matches!(err, HectorError::MissingData("diff coverage summary")));
    }

    #[test]
    fn test_render_title_emoji() {
        let diff = diff_with_files(1);
        let ok = render(Some(&cov(50.0)), Some(&diff), &ctx(0)).unwrap();
        let title = ok.lines().next().unwrap();
        assert_eq!(title, "## 📈 Diff Coverage 10.00% ✅");

        for code in [1, 2, -1] {
            let failed = render(Some(&cov(50.0)), Some(&diff), &ctx(code)).unwrap();
            let title = failed.lines().next().unwrap();
            assert_eq!(title, "## 📈 Diff Coverage 10.00% ❗️");
        }
    }

    #[test]
    fn test_render_subtitle() {
        let diff = DiffCoverageSummary::new(90.0, 40, 4, vec![]).unwrap();
        let md = render(Some(&cov(87.5)), Some(&diff), &ctx(0)).unwrap();
        assert!(md.contains("##### Overall Coverage 87.50% | Covered Lines 36 | Missing 4"));
    }

    #[test]
    fn test_render_omits_files_when_fully_covered() {
        let diff = DiffCoverageSummary::new(
            100.0,
            12,
            0,
            vec![("a.py".to_string(), stat(100.0, &[]))],
        )
        .unwrap();
        let md = render(Some(&cov(80.0)), Some(&diff), &ctx(0)).unwrap();
        assert!(!md.contains("Impacted Files"));
        assert!(!md.contains("```"));
        assert!(!md.contains("Full Coverage Report"));
        assert!(md.contains("Diff Coverage 100.00% ✅"));
    }

    #[test]
    fn test_render_excludes_fully_covered_files() {
        let diff = DiffCoverageSummary::new(
            50.0,
            4,
            2,
            vec![
                ("done.py".to_string(), stat(100.0, &[])),
                ("todo.py".to_string(), stat(0.0, &[7, 8])),
            ],
        )
        .unwrap();
        let md = render(Some(&cov(80.0)), Some(&diff), &ctx(0)).unwrap();
        assert!(md.contains("❗️  0.00% | todo.py 7-8\n"));
        assert!(!md.contains("done.py"));
    }

    #[test]
    fn test_render_ten_files_not_truncated() {
        let md = render(Some(&cov(50.0)), Some(&diff_with_files(10)), &ctx(0)).unwrap();
        assert_eq!(md.matches("| pkg/mod_").count(), 10);
        assert!(md.contains(
            "> Check [Full Coverage Report](https://bitbucket.org/acme/shop/pipelines/results/7)"
        ));
        assert!(!md.contains("more files"));
    }

    #[test]
    fn test_render_eleven_files_truncated() {
        let md = render(Some(&cov(50.0)), Some(&diff_with_files(11)), &ctx(0)).unwrap();
        assert_eq!(md.matches("| pkg/mod_").count(), 10);
        assert!(!md.contains("pkg/mod_10.py"));
        assert!(md.contains(
            "> _1_ more files [Full Coverage Report](https://bitbucket.org/acme/shop/pipelines/results/7)"
        ));
        assert!(!md.contains("> Check"));
    }

    #[test]
    fn test_render_fence_wraps_file_lines() {
        let md = render(Some(&cov(50.0)), Some(&diff_with_files(2)), &ctx(0)).unwrap();
        let open = md.find("```sh\n").unwrap();
        let close = md.rfind("```\n").unwrap();
        let first = md.find("pkg/mod_00.py").unwrap();
        let last = md.find("pkg/mod_01.py").unwrap();
        assert!(open < first && last < close);
        assert!(md.find("Impacted Files").unwrap() < open);
        assert!(close < md.find("Full Coverage Report").unwrap());
    }

    #[test]
    fn test_render_footer() {
        let md = render(Some(&cov(50.0)), Some(&diff_with_files(1)), &ctx(0)).unwrap();
        let link = "https://bitbucket.org/acme/shop/commits/abc1234";
        assert!(md.ends_with(&format!(
            "###### 📝 Reported on commit [{link}]({link}){{: data-inline-card='' }} | {FIXED_TIME}\n"
        )));
    }

    #[test]
    fn test_format_file_line_width() {
        assert_eq!(
            format_file_line("a.py", &stat(5.0, &[3])),
            "❗️  5.00% | a.py 3"
        );
        assert_eq!(
            format_file_line("b.py", &stat(66.666, &[1, 2])),
            "❗️ 66.67% | b.py 1-2"
        );
        assert_eq!(format_file_line("c.py", &stat(99.5, &[])), "❗️ 99.50% | c.py");
    }

    #[test]
    fn test_commit_link_without_placeholder() {
        let mut c = ctx(0);
        c.review_link_template = "https://bitbucket.org/acme/shop/commits/".to_string();
        assert_eq!(
            c.commit_link(),
            "https://bitbucket.org/acme/shop/commits/abc1234"
        );
    }
}
