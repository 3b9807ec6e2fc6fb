use crate::infra::{parse_role, InMemoryStores};
use chrono::{Duration, Utc};
use clap::Args;
use enrollment_approvals::config::WorkflowConfig;
use enrollment_approvals::error::AppError;
use enrollment_approvals::workflows::enrollment::{
    seed, CourseCatalog, Decision, DecisionSubmission, EnrollmentServiceError, EvidenceAttachment,
    RequestStatusView, RequestSubmission, ReviewRole, UserId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Stage that rejects the request instead of approving it.
    #[arg(long, value_parser = parse_role)]
    pub(crate) reject_at: Option<ReviewRole>,
}

pub(crate) fn run_catalog_seed() -> Result<(), AppError> {
    let stores = InMemoryStores::default();
    let report = seed(stores.courses.as_ref())?;

    for course in &report.created {
        println!("created        {:<10} {}", course.code, course.name);
    }
    for course in &report.existing {
        println!("already exists {:<10} {}", course.code, course.name);
    }
    println!(
        "{} courses ({} created, {} existing)",
        report.total(),
        report.created.len(),
        report.existing.len()
    );
    Ok(())
}

pub(crate) fn run_catalog_list() -> Result<(), AppError> {
    let stores = InMemoryStores::default();
    seed(stores.courses.as_ref())?;

    for course in stores.courses.active()? {
        println!("{:<10} {:<36} {}", course.code, course.name, course.description);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let stores = InMemoryStores::default();
    seed(stores.courses.as_ref())?;
    let config = WorkflowConfig::default();
    let service = stores.service(config.clone());

    let student = UserId("student-demo".to_string());
    let now = Utc::now();
    let Some(course) = stores.courses.find_by_code("ALG001")? else {
        println!("Course ALG001 missing from the seeded catalog");
        return Ok(());
    };

    println!("Enrollment approval demo");
    let request = service.submit(
        RequestSubmission {
            student: student.clone(),
            course: course.id.clone(),
            reason: "Need the course to complete the semester plan".to_string(),
            evidence: Some(EvidenceAttachment {
                storage_key: "requests/demo/transcript.pdf".to_string(),
            }),
        },
        now,
    )?;
    println!(
        "- Submitted {} for {} ({}), deadline {}",
        request.id,
        course.code,
        course.name,
        request
            .deadline
            .map(|deadline| deadline.to_rfc3339())
            .unwrap_or_else(|| "none".to_string())
    );

    for (step, role) in ReviewRole::ordered().into_iter().enumerate() {
        let decision = if args.reject_at == Some(role) {
            Decision::Rejected
        } else {
            Decision::Approved
        };
        let submission = DecisionSubmission {
            role: role.label().to_string(),
            actor: UserId(format!("{}-demo", role.label())),
            decision: decision.label().to_string(),
            justification: format!("{} review by the {}", decision.label(), role.label()),
        };

        let at = now + Duration::hours(step as i64 + 1);
        match service.decide(&request.id, submission, at) {
            Ok(outcome) => println!(
                "- {}: {} -> request {}",
                role,
                outcome.decision,
                outcome.request.status().label()
            ),
            Err(EnrollmentServiceError::Approval(error)) => println!("- {role}: refused ({error})"),
            Err(other) => return Err(other.into()),
        }
    }

    println!(
        "- Unread notifications for {}: {}",
        student,
        stores.notifications.unread(&student)?
    );
    let dashboard = service.student_dashboard(&student, Utc::now())?;
    for notification in &dashboard.notifications {
        println!("    - {}", notification.message);
    }

    let current = service.get(&request.id, Utc::now())?;
    match serde_json::to_string_pretty(&RequestStatusView::from_request(&current, Utc::now())) {
        Ok(json) => println!("  Status payload:\n{}", json),
        Err(err) => println!("  Status payload unavailable: {}", err),
    }

    let late = service.submit(
        RequestSubmission {
            student: student.clone(),
            course: course.id,
            reason: "Second request left unreviewed".to_string(),
            evidence: None,
        },
        now,
    )?;
    let observed_at = now + config.review_window() + Duration::seconds(1);
    let expired = service.get(&late.id, observed_at)?;
    println!(
        "- {} observed after its deadline: {} ({})",
        expired.id,
        expired.status().label(),
        expired.stage(ReviewRole::Instructor).justification
    );

    if stores.courses.deactivate("UX001")? {
        if let Some(retired) = stores.courses.find_by_code("UX001")? {
            let attempt = service.submit(
                RequestSubmission {
                    student,
                    course: retired.id,
                    reason: "Interested in design".to_string(),
                    evidence: None,
                },
                now,
            );
            if let Err(error) = attempt {
                println!("- Submission against a retired course refused: {error}");
            }
        }
    }

    Ok(())
}
