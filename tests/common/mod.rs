use hector::clock::Timestamp;
use hector::report::RenderContext;

pub const FIXED_TIME: &str = "04:05 PM UTC+05:30, Friday, 01 March 2024";

/// Clock that always reports [`FIXED_TIME`].
pub struct FixedClock;

impl Timestamp for FixedClock {
    fn timestamp(&self) -> String {
        FIXED_TIME.to_string()
    }
}

/// Render context for a pipeline run on `acme/shop` at commit `abc1234`.
pub fn context(exit_code: i32) -> RenderContext<'static> {
    RenderContext {
        exit_code,
        review_link_template: "https://bitbucket.org/acme/shop/commits/{commit}".to_string(),
        build_link_template: "https://bitbucket.org/acme/shop/pipelines/results/{p}/steps/{s}"
            .to_string(),
        commit_id: "abc1234".to_string(),
        timestamp: &FixedClock,
    }
}
