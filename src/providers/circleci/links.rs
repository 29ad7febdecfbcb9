//! Links into the CircleCI web app.

const APP_URL: &str = "https://app.circleci.com/pipelines";

/// Web app path prefix for a project slug such as `gh/org/repo`.
fn project_path(project_slug: &str) -> String {
    let mut parts = project_slug.splitn(2, '/');
    let vcs = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    let provider = match vcs {
        "gh" | "github" => "github",
        _ => "bitbucket",
    };
    format!("{APP_URL}/{provider}/{rest}")
}

pub fn pipeline_url(project_slug: &str, pipeline_number: u64) -> String {
    format!("{}/{pipeline_number}", project_path(project_slug))
}

pub fn workflow_url(project_slug: &str, pipeline_number: u64, workflow_id: &str) -> String {
    format!(
        "{}/workflows/{workflow_id}",
        pipeline_url(project_slug, pipeline_number)
    )
}

pub fn job_url(
    project_slug: &str,
    pipeline_number: u64,
    workflow_id: &str,
    job_number: u64,
) -> String {
    format!(
        "{}/jobs/{job_number}",
        workflow_url(project_slug, pipeline_number, workflow_id)
    )
}
