//! Report lines for scanned images and deletion candidates.

use crate::image::{Candidate, ImageRecord};
use crate::time::format_push_time;

use humansize::{format_size, BINARY};
use tracing::info;

/// Tags rendered like `[v1 latest]`, or `<untagged>`
fn render_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        "<untagged>".to_string()
    } else {
        format!("[{}]", tags.join(" "))
    }
}

fn render_size(size_bytes: Option<u64>) -> String {
    size_bytes
        .map(|b| format_size(b, BINARY))
        .unwrap_or_else(|| "-".to_string())
}

/// One scanned image, as listed under its repository
pub fn scanned_line(image: &ImageRecord) -> String {
    format!(
        "[Scanned] Digest: {}, Tags: {}, PushedAt: {}, Size: {}",
        image.digest,
        render_tags(&image.tags),
        format_push_time(image.pushed_at),
        render_size(image.size_bytes)
    )
}

/// One candidate, as listed under its repository
pub fn candidate_line(candidate: &Candidate) -> String {
    format!(
        "[Candidate] Tag: {}, Digest: {}, PushedAt: {}, AllTags: {}, Reason: {}",
        display_tag(candidate),
        candidate.digest,
        format_push_time(candidate.pushed_at),
        render_tags(&candidate.all_tags),
        candidate.reason
    )
}

fn display_tag(candidate: &Candidate) -> &str {
    if candidate.is_untagged() {
        "<untagged>"
    } else {
        &candidate.tag
    }
}

/// Sum of known candidate sizes
pub fn reclaimable_bytes(candidates: &[Candidate]) -> u64 {
    candidates.iter().filter_map(|c| c.size_bytes).sum()
}

pub fn format_reclaimable(candidates: &[Candidate]) -> String {
    format_size(reclaimable_bytes(candidates), BINARY)
}

/// Log the full scanned and candidate lists across all repositories
pub fn log_summary(scanned: &[ImageRecord], candidates: &[Candidate]) {
    info!("-------------------------------");
    info!("Original ECR Scanning Image List:");
    for image in scanned {
        info!(
            "Repository: {}, Tags: {}, Digest: {}, PushedAt: {}",
            image.repository_name,
            render_tags(&image.tags),
            image.digest,
            format_push_time(image.pushed_at)
        );
    }

    info!("After Filter Image List (Candidates for deletion):");
    for cand in candidates {
        info!(
            "Repository: {}, Tag: {}, Digest: {}, PushedAt: {}, AllTags: {}, Reason: {}",
            cand.repository_name,
            display_tag(cand),
            cand.digest,
            format_push_time(cand.pushed_at),
            render_tags(&cand.all_tags),
            cand.reason
        );
    }
    info!(
        "{} of {} scanned images selected, {} reclaimable",
        candidates.len(),
        scanned.len(),
        format_reclaimable(candidates)
    );
    info!("-------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::SelectionReason;
    use chrono::{TimeZone, Utc};

    fn record(tags: &[&str], size: Option<u64>) -> ImageRecord {
        ImageRecord {
            repository_name: "shop/web".to_string(),
            repository_uri: "123.dkr.ecr.us-east-1.amazonaws.com/shop/web".to_string(),
            digest: "sha256:abc".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pushed_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()),
            size_bytes: size,
        }
    }

    #[test]
    fn test_scanned_line() {
        let line = scanned_line(&record(&["v1", "latest"], Some(2048)));
        assert_eq!(
            line,
            "[Scanned] Digest: sha256:abc, Tags: [v1 latest], PushedAt: 2024-02-01T10:00:00Z, Size: 2 KiB"
        );
    }

    #[test]
    fn test_candidate_line_for_untagged() {
        let cand = Candidate::from_record(&record(&[], None), SelectionReason::Untagged);
        let line = candidate_line(&cand);
        assert!(line.starts_with("[Candidate] Tag: <untagged>, Digest: sha256:abc"));
        assert!(line.ends_with("Reason: untagged"));
    }

    #[test]
    fn test_reclaimable_ignores_unknown_sizes() {
        let candidates = vec![
            Candidate::from_record(&record(&["a"], Some(1024)), SelectionReason::NotInUse),
            Candidate::from_record(&record(&["b"], None), SelectionReason::NotInUse),
            Candidate::from_record(&record(&[], Some(1024)), SelectionReason::Untagged),
        ];
        assert_eq!(reclaimable_bytes(&candidates), 2048);
        assert_eq!(format_reclaimable(&candidates), "2 KiB");
    }
}
