use serde::Serialize;

use super::domain::Course;
use super::repository::{CourseCatalog, CourseSeed, RepositoryError};

#[rustfmt::skip]
const STANDARD_COURSES: [(&str, &str, &str); 20] = [
    ("ALG001", "Algorithms and Data Structures I", "Introduction to algorithms and basic data structures"),
    ("ALG002", "Algorithms and Data Structures II", "Advanced data structures and sorting algorithms"),
    ("WEB001", "Web Development I", "HTML, CSS and introductory JavaScript"),
    ("WEB002", "Web Development II", "Frontend and backend frameworks"),
    ("BD001", "Databases I", "Data modelling and introductory SQL"),
    ("BD002", "Databases II", "Database administration and tuning"),
    ("JAVA001", "Java Programming I", "Java language fundamentals"),
    ("JAVA002", "Java Programming II", "Advanced Java and frameworks"),
    ("PY001", "Python for Beginners", "Introduction to programming with Python"),
    ("PY002", "Advanced Python", "Advanced programming in Python"),
    ("SO001", "Operating Systems", "Operating system concepts"),
    ("REDE001", "Computer Networks", "Networking fundamentals and protocols"),
    ("SEC001", "Information Security", "Principles of cyber security"),
    ("MOBILE001", "Mobile Development", "Building mobile applications"),
    ("IA001", "Artificial Intelligence", "Introduction to AI and machine learning"),
    ("DEVOPS001", "DevOps and Cloud", "DevOps practices and cloud computing"),
    ("PROJ001", "Project Management", "Agile methods and project management"),
    ("UX001", "UX/UI Design", "User experience design"),
    ("TEST001", "Software Testing", "Testing techniques and software quality"),
    ("API001", "API Development", "REST, GraphQL and microservices"),
];

/// The standard IT course list used to bootstrap an empty catalog.
pub fn standard_courses() -> Vec<CourseSeed> {
    STANDARD_COURSES
        .iter()
        .map(|(code, name, description)| CourseSeed {
            code: (*code).to_string(),
            name: (*name).to_string(),
            description: (*description).to_string(),
        })
        .collect()
}

/// Outcome of a seeding pass, split by whether each course was new.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub created: Vec<Course>,
    pub existing: Vec<Course>,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.existing.len()
    }
}

/// Idempotently loads [`standard_courses`] into `catalog`.
pub fn seed<C>(catalog: &C) -> Result<SeedReport, RepositoryError>
where
    C: CourseCatalog + ?Sized,
{
    seed_with(catalog, standard_courses())
}

pub fn seed_with<C>(catalog: &C, seeds: Vec<CourseSeed>) -> Result<SeedReport, RepositoryError>
where
    C: CourseCatalog + ?Sized,
{
    let mut report = SeedReport::default();
    for seed in seeds {
        let (course, created) = catalog.get_or_create(seed)?;
        if created {
            report.created.push(course);
        } else {
            report.existing.push(course);
        }
    }
    Ok(report)
}
