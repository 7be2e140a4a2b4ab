use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use skillfolio::aggregate::{DashboardSummary, TokenCount};
use skillfolio::models::{
    Credentials, ErrorBody, LoginResponse, Project, ProjectInput, RecordIdResponse, SignupResponse,
    Skill, SkillInput, WhoamiResponse,
};

use skillfolio::validation::{Validate, ValidationErrors};

const SESSION_FILE: &str = ".skillfolio-session";

#[derive(Parser)]
#[command(name = "skillfolio")]
#[command(about = "Track your skills and project portfolio", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = "SKILLFOLIO_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new account")]
    Signup {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show current user")]
    Whoami,

    #[command(about = "Manage your skills")]
    Skills {
        #[command(subcommand)]
        action: SkillCommand,
    },

    #[command(about = "Manage your projects")]
    Projects {
        #[command(subcommand)]
        action: ProjectCommand,
    },

    #[command(about = "Overview of your skills and projects")]
    Dashboard,
}

#[derive(Subcommand)]
enum SkillCommand {
    #[command(about = "List your skills, newest first")]
    List,

    #[command(about = "Show one skill")]
    Show { id: String },

    #[command(about = "Add a skill")]
    Add {
        #[arg(short, long, help = "Skill name")]
        name: String,

        #[arg(short, long, help = "Proficiency level from 1 to 5")]
        level: i64,

        #[arg(short, long, help = "Tags (comma-separated)")]
        tags: String,
    },

    #[command(about = "Edit a skill; omitted fields keep their current value")]
    Edit {
        id: String,

        #[arg(short, long, help = "Skill name")]
        name: Option<String>,

        #[arg(short, long, help = "Proficiency level from 1 to 5")]
        level: Option<i64>,

        #[arg(short, long, help = "Tags (comma-separated)")]
        tags: Option<String>,
    },

    #[command(about = "Delete a skill")]
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProjectCommand {
    #[command(about = "List your projects, newest first")]
    List,

    #[command(about = "Show one project")]
    Show { id: String },

    #[command(about = "Add a project")]
    Add {
        #[arg(short, long, help = "Project title")]
        title: String,

        #[arg(short, long, help = "Project description")]
        description: String,

        #[arg(short, long, help = "Technologies (comma-separated)")]
        stack: String,

        #[arg(short, long, help = "Link to the project (optional)")]
        link: Option<String>,
    },

    #[command(about = "Edit a project; omitted fields keep their current value")]
    Edit {
        id: String,

        #[arg(short, long, help = "Project title")]
        title: Option<String>,

        #[arg(short, long, help = "Project description")]
        description: Option<String>,

        #[arg(short, long, help = "Technologies (comma-separated)")]
        stack: Option<String>,

        #[arg(short, long, help = "Link to the project; pass an empty string to clear it")]
        link: Option<String>,
    },

    #[command(about = "Delete a project")]
    Remove { id: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    token: String,
    user_id: String,
    username: String,
}

impl Session {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(SESSION_FILE, json)?;
        Ok(())
    }

    fn load() -> Option<Self> {
        if Path::new(SESSION_FILE).exists() {
            let data = fs::read_to_string(SESSION_FILE).ok()?;
            serde_json::from_str(&data).ok()
        } else {
            None
        }
    }

    fn clear() -> Result<()> {
        if Path::new(SESSION_FILE).exists() {
            fs::remove_file(SESSION_FILE)?;
        }
        Ok(())
    }
}

struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .context("Failed to connect to the skillfolio service. Is the server running?")?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.context("Failed to parse response");
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(error) => {
                if let Some(fields) = &error.fields {
                    for (field, messages) in fields {
                        for message in messages {
                            eprintln!("   • {}: {}", field, message);
                        }
                    }
                }
                if status == StatusCode::UNAUTHORIZED && error.code == "UNAUTHENTICATED" {
                    bail!("Your session has expired. Use: skillfolio login -u <username> -p <password>");
                }
                bail!("{}", error.error)
            }
            Err(_) => bail!("Request failed ({}): {}", status, text),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send::<(), T>(Method::DELETE, path, None).await
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli.api_url, cli.command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(api_url: String, command: Commands) -> Result<()> {
    match command {
        Commands::Signup { username, password } => {
            signup(&ApiClient::new(api_url, None), username, password).await?;
        }
        Commands::Login { username, password } => {
            login(&ApiClient::new(api_url, None), username, password).await?;
        }
        Commands::Logout => {
            logout(api_url).await?;
        }
        Commands::Whoami => {
            let session = require_login()?;
            whoami(&ApiClient::new(api_url, Some(session.token))).await?;
        }
        Commands::Skills { action } => {
            let session = require_login()?;
            let api = ApiClient::new(api_url, Some(session.token));
            match action {
                SkillCommand::List => list_skills(&api).await?,
                SkillCommand::Show { id } => show_skill(&api, &id).await?,
                SkillCommand::Add { name, level, tags } => {
                    let input = SkillInput {
                        name,
                        level,
                        tags: parse_list(&tags),
                    };
                    add_skill(&api, input).await?;
                }
                SkillCommand::Edit { id, name, level, tags } => {
                    edit_skill(&api, &id, name, level, tags).await?;
                }
                SkillCommand::Remove { id } => remove_skill(&api, &id).await?,
            }
        }
        Commands::Projects { action } => {
            let session = require_login()?;
            let api = ApiClient::new(api_url, Some(session.token));
            match action {
                ProjectCommand::List => list_projects(&api).await?,
                ProjectCommand::Show { id } => show_project(&api, &id).await?,
                ProjectCommand::Add {
                    title,
                    description,
                    stack,
                    link,
                } => {
                    let input = ProjectInput {
                        title,
                        description,
                        tech_stack: parse_list(&stack),
                        link,
                    };
                    add_project(&api, input).await?;
                }
                ProjectCommand::Edit {
                    id,
                    title,
                    description,
                    stack,
                    link,
                } => {
                    edit_project(&api, &id, title, description, stack, link).await?;
                }
                ProjectCommand::Remove { id } => remove_project(&api, &id).await?,
            }
        }
        Commands::Dashboard => {
            let session = require_login()?;
            dashboard(&ApiClient::new(api_url, Some(session.token)), &session.username).await?;
        }
    }

    Ok(())
}

/// Split comma-separated input, trimming entries and keeping the first of
/// any duplicates.
fn parse_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|i| i == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn check<T: Validate + Clone>(input: &T) -> Result<()> {
    if let Err(errors) = input.clone().validate() {
        print_validation(&errors);
        bail!("Please fix the fields above and try again");
    }
    Ok(())
}

fn print_validation(errors: &ValidationErrors) {
    eprintln!("⚠️  Invalid input:");
    for (field, messages) in errors.fields() {
        for message in messages {
            eprintln!("   • {}: {}", field, message);
        }
    }
}

fn require_login() -> Result<Session> {
    Session::load()
        .ok_or_else(|| anyhow::anyhow!("You must be logged in. Use: skillfolio login -u <username> -p <password>"))
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn stars(level: u8) -> String {
    format!("{}{}", "★".repeat(level as usize), "☆".repeat(5usize.saturating_sub(level as usize)))
}

async fn signup(api: &ApiClient, username: String, password: String) -> Result<()> {
    let created: SignupResponse = api
        .post("/auth/signup", &Credentials { username, password })
        .await?;

    println!("✅ Account created successfully!");
    println!("👤 Username: {}", created.username);
    println!("🆔 User ID: {}", created.id);
    println!("\n💡 You can now log in using: skillfolio login -u {} -p <password>", created.username);

    Ok(())
}

async fn login(api: &ApiClient, username: String, password: String) -> Result<()> {
    let response: LoginResponse = api
        .post("/auth/login", &Credentials { username, password })
        .await?;

    let session = Session {
        token: response.token,
        user_id: response.user_id,
        username: response.username.clone(),
    };
    session.save()?;

    println!("✅ Login successful!");
    println!("👤 Welcome back, {}!", response.username);
    println!("⏰ Session valid until {}", local_time(response.expires_at));

    Ok(())
}

async fn logout(api_url: String) -> Result<()> {
    if let Some(session) = Session::load() {
        // The local session goes away even if the server is unreachable.
        if let Err(e) = reqwest::Client::new()
            .post(format!("{}/auth/logout", api_url.trim_end_matches('/')))
            .bearer_auth(&session.token)
            .send()
            .await
        {
            eprintln!("⚠️  Could not reach the server to end the session: {}", e);
        }
    }

    Session::clear()?;
    println!("✅ Logged out successfully!");
    Ok(())
}

async fn whoami(api: &ApiClient) -> Result<()> {
    let me: WhoamiResponse = api.get("/auth/me").await?;
    println!("👤 Logged in as: {}", me.username);
    println!("🆔 User ID: {}", me.user_id);
    Ok(())
}

async fn list_skills(api: &ApiClient) -> Result<()> {
    let skills: Vec<Skill> = api.get("/skills").await?;

    if skills.is_empty() {
        println!("📭 No skills yet.");
        println!("💡 Use 'skillfolio skills add -n <name> -l <1-5> -t <tags>' to add one");
        return Ok(());
    }

    println!("\n🧠 Your Skills ({})\n", skills.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Level"),
        Cell::new("Tags"),
        Cell::new("Updated"),
    ]));

    for skill in &skills {
        table.add_row(Row::new(vec![
            Cell::new(&skill.meta.id),
            Cell::new(&skill.name),
            Cell::new(&stars(skill.level)),
            Cell::new(&skill.tags.join(", ")),
            Cell::new(&local_time(skill.meta.updated_at)),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn fetch_skill(api: &ApiClient, id: &str) -> Result<Skill> {
    let skill: Option<Skill> = api.get(&format!("/skills/{}", id)).await?;
    skill.ok_or_else(|| anyhow::anyhow!("Skill not found with ID: {}", id))
}

async fn show_skill(api: &ApiClient, id: &str) -> Result<()> {
    let skill = fetch_skill(api, id).await?;

    println!("🧠 {}", skill.name);
    println!("   🆔 ID: {}", skill.meta.id);
    println!("   📊 Level: {} ({}/5)", stars(skill.level), skill.level);
    println!("   🏷️  Tags: {}", skill.tags.join(", "));
    println!("   ⏰ Created: {}", local_time(skill.meta.created_at));
    println!("   ✏️  Updated: {}", local_time(skill.meta.updated_at));

    Ok(())
}

async fn add_skill(api: &ApiClient, input: SkillInput) -> Result<()> {
    check(&input)?;
    let created: RecordIdResponse = api.post("/skills", &input).await?;

    println!("✅ Skill '{}' added!", input.name);
    println!("🆔 Skill ID: {}", created.id);
    println!("\n💡 Use 'skillfolio skills list' to see all your skills");

    Ok(())
}

async fn edit_skill(
    api: &ApiClient,
    id: &str,
    name: Option<String>,
    level: Option<i64>,
    tags: Option<String>,
) -> Result<()> {
    let current = fetch_skill(api, id).await?;

    // Updates replace every field, so unspecified ones are resent as-is.
    let mut input = SkillInput::from(&current);
    if let Some(name) = name {
        input.name = name;
    }
    if let Some(level) = level {
        input.level = level;
    }
    if let Some(tags) = tags {
        input.tags = parse_list(&tags);
    }

    check(&input)?;
    let _: RecordIdResponse = api.put(&format!("/skills/{}", id), &input).await?;

    println!("✅ Skill '{}' updated!", input.name);
    Ok(())
}

async fn remove_skill(api: &ApiClient, id: &str) -> Result<()> {
    let removed: RecordIdResponse = api.delete(&format!("/skills/{}", id)).await?;
    println!("🗑️  Skill {} deleted", removed.id);
    Ok(())
}

async fn list_projects(api: &ApiClient) -> Result<()> {
    let projects: Vec<Project> = api.get("/projects").await?;

    if projects.is_empty() {
        println!("📭 No projects yet.");
        println!("💡 Use 'skillfolio projects add -t <title> -d <description> -s <stack>' to add one");
        return Ok(());
    }

    println!("\n📁 Your Projects ({})\n", projects.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Title"),
        Cell::new("Tech Stack"),
        Cell::new("Link"),
        Cell::new("Updated"),
    ]));

    for project in &projects {
        table.add_row(Row::new(vec![
            Cell::new(&project.meta.id),
            Cell::new(&project.title),
            Cell::new(&project.tech_stack.join(", ")),
            Cell::new(project.link.as_deref().unwrap_or("-")),
            Cell::new(&local_time(project.meta.updated_at)),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn fetch_project(api: &ApiClient, id: &str) -> Result<Project> {
    let project: Option<Project> = api.get(&format!("/projects/{}", id)).await?;
    project.ok_or_else(|| anyhow::anyhow!("Project not found with ID: {}", id))
}

async fn show_project(api: &ApiClient, id: &str) -> Result<()> {
    let project = fetch_project(api, id).await?;

    println!("📁 {}", project.title);
    println!("   🆔 ID: {}", project.meta.id);
    println!("   📝 {}", project.description);
    println!("   🧰 Stack: {}", project.tech_stack.join(", "));
    if let Some(link) = &project.link {
        println!("   🔗 Link: {}", link);
    }
    println!("   ⏰ Created: {}", local_time(project.meta.created_at));
    println!("   ✏️  Updated: {}", local_time(project.meta.updated_at));

    Ok(())
}

async fn add_project(api: &ApiClient, input: ProjectInput) -> Result<()> {
    check(&input)?;
    let created: RecordIdResponse = api.post("/projects", &input).await?;

    println!("✅ Project '{}' added!", input.title);
    println!("🆔 Project ID: {}", created.id);
    println!("\n💡 Use 'skillfolio projects list' to see all your projects");

    Ok(())
}

async fn edit_project(
    api: &ApiClient,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    stack: Option<String>,
    link: Option<String>,
) -> Result<()> {
    let current = fetch_project(api, id).await?;

    let mut input = ProjectInput::from(&current);
    if let Some(title) = title {
        input.title = title;
    }
    if let Some(description) = description {
        input.description = description;
    }
    if let Some(stack) = stack {
        input.tech_stack = parse_list(&stack);
    }
    if let Some(link) = link {
        input.link = Some(link);
    }

    check(&input)?;
    let _: RecordIdResponse = api.put(&format!("/projects/{}", id), &input).await?;

    println!("✅ Project '{}' updated!", input.title);
    Ok(())
}

async fn remove_project(api: &ApiClient, id: &str) -> Result<()> {
    let removed: RecordIdResponse = api.delete(&format!("/projects/{}", id)).await?;
    println!("🗑️  Project {} deleted", removed.id);
    Ok(())
}

async fn dashboard(api: &ApiClient, username: &str) -> Result<()> {
    let skills: Vec<Skill> = api.get("/skills").await?;
    let projects: Vec<Project> = api.get("/projects").await?;
    let summary = DashboardSummary::from_records(&skills, &projects);

    print!("{}", dashboard_report(username, &summary));
    Ok(())
}

fn dashboard_report(username: &str, summary: &DashboardSummary) -> String {
    let mut out = format!("\n👋 Welcome back, {}!\n", username);
    out.push_str("Here's an overview of your skills and projects\n\n");

    let mut stats = Table::new();
    stats.add_row(Row::new(vec![
        Cell::new("Total Skills"),
        Cell::new("Total Projects"),
        Cell::new("Average Skill Level"),
    ]));
    let average = summary
        .average_level
        .map(|a| format!("{:.1} / 5.0", a))
        .unwrap_or_else(|| "-".to_string());
    stats.add_row(Row::new(vec![
        Cell::new(&summary.total_skills.to_string()),
        Cell::new(&summary.total_projects.to_string()),
        Cell::new(&average),
    ]));
    out.push_str(&stats.to_string());

    if summary.is_empty() {
        out.push_str("\n🚀 Quick start\n");
        out.push_str("💡 Add your first skill:   skillfolio skills add -n <name> -l <1-5> -t <tags>\n");
        out.push_str("💡 Add your first project: skillfolio projects add -t <title> -d <description> -s <stack>\n");
        return out;
    }

    out.push_str("\n📊 Skill Levels Distribution\n\n");
    if summary.total_skills == 0 {
        out.push_str("   No skills data available\n");
    } else {
        let mut levels = Table::new();
        for bucket in &summary.level_distribution {
            levels.add_row(Row::new(vec![
                Cell::new(&format!("Level {}", bucket.level)),
                Cell::new(&bucket.count.to_string()),
                Cell::new(&"█".repeat(bucket.count)),
            ]));
        }
        out.push_str(&levels.to_string());
    }

    out.push_str("\n🧰 Top Technologies\n\n");
    out.push_str(&ranking_report(&summary.top_technologies, "No projects data available"));

    out.push_str("\n🏷️  Top Skill Tags\n\n");
    out.push_str(&ranking_report(&summary.top_tags, "No skills data available"));
    out.push('\n');

    out
}

fn ranking_report(entries: &[TokenCount], empty: &str) -> String {
    if entries.is_empty() {
        return format!("   {}\n", empty);
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Name"), Cell::new("Count"), Cell::new("Share")]));
    for entry in entries {
        table.add_row(Row::new(vec![
            Cell::new(&entry.name),
            Cell::new(&entry.count.to_string()),
            Cell::new(&format!("{:.1}%", entry.percent)),
        ]));
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillfolio::storage::RecordMeta;

    #[test]
    fn parse_list_trims_and_dedupes() {
        assert_eq!(parse_list(" react, ts ,react,, "), vec!["react", "ts"]);
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn stars_render_five_slots() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(5), "★★★★★");
    }

    fn skill(name: &str, level: u8, tags: &[&str]) -> Skill {
        Skill {
            meta: RecordMeta::new("owner", Utc::now()),
            name: name.to_string(),
            level,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn project(title: &str, stack: &[&str]) -> Project {
        Project {
            meta: RecordMeta::new("owner", Utc::now()),
            title: title.to_string(),
            description: "A project".to_string(),
            tech_stack: stack.iter().map(|t| t.to_string()).collect(),
            link: None,
        }
    }

    #[test]
    fn dashboard_report_shows_totals_levels_and_rankings() {
        let skills = vec![
            skill("Rust", 5, &["backend", "systems"]),
            skill("React", 4, &["frontend"]),
        ];
        let projects = vec![project("Site", &["React", "Rust"]), project("Tool", &["Rust"])];
        let summary = DashboardSummary::from_records(&skills, &projects);

        let report = dashboard_report("ada", &summary);
        assert!(report.contains("Welcome back, ada!"));
        assert!(report.contains("4.5 / 5.0"));
        assert!(report.contains("Level 5"));
        assert!(report.contains("66.7%"));
        assert!(report.contains("backend"));
        assert!(!report.contains("Quick start"));
    }

    #[test]
    fn dashboard_report_for_new_account_shows_quick_start() {
        let summary = DashboardSummary::from_records(&[], &[]);
        let report = dashboard_report("ada", &summary);
        assert!(report.contains("Quick start"));
        assert!(!report.contains("Top Technologies"));
    }

    #[test]
    fn ranking_report_falls_back_to_empty_message() {
        assert_eq!(ranking_report(&[], "No projects data available"), "   No projects data available\n");
    }
}
