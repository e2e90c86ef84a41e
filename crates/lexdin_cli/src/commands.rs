//! Subcommand implementations.

use crate::Credentials;
use lexdin_core::fixtures::{load_fixtures, seed_repository};
use lexdin_core::{
    AppConfig, ChatOutcome, ChatSession, DirectoryIdentityProvider, GeminiClient,
    IdentityProvider, ModificationWorkflow, NormCard, NormService, NormView, SqliteNormRepository,
    User,
};
use log::info;
use std::error::Error;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type CliResult = Result<(), Box<dyn Error>>;

pub(crate) struct Context {
    norms: NormService<SqliteNormRepository>,
    directory: DirectoryIdentityProvider,
    config: AppConfig,
}

impl Context {
    /// Opens the store at `db` and seeds any missing fixture norms.
    pub(crate) fn open(db: &Path, config: AppConfig) -> Result<Self, Box<dyn Error>> {
        let fixtures = load_fixtures()?;
        let repo = SqliteNormRepository::open(db)?;
        seed_repository(&repo, &fixtures.norms)?;
        Ok(Self {
            norms: NormService::new(repo),
            directory: fixtures.directory(),
            config,
        })
    }

    pub(crate) fn list(&self, credentials: &Credentials, query: &str) -> CliResult {
        let user = self.sign_in(credentials)?;
        let cards = self.norms.list_norms(user.as_ref(), query)?;
        if cards.is_empty() {
            println!("Sin resultados.");
        }
        for card in &cards {
            print_card(card);
        }
        Ok(())
    }

    pub(crate) fn show(&self, credentials: &Credentials, id: &str, version: Option<u32>) -> CliResult {
        let user = self.sign_in(credentials)?;
        match self.norms.view_norm(id, user.as_ref(), version)? {
            NormView::Restricted(header) => {
                println!("{} ({})", header.title, header.id);
                println!("{}", header.description);
                println!();
                println!("Contenido restringido: requiere rol DIRECTIVO o ADMIN.");
            }
            NormView::Visible { norm, selected } => {
                println!("{} ({})", norm.title, norm.id);
                println!(
                    "Versión {} de {} | {}",
                    selected.version,
                    norm.current_version().version,
                    selected.date.format("%Y-%m-%d")
                );
                if let Some(modification) = &selected.modification {
                    println!(
                        "Modificada por: {} ({})",
                        modification.modifying_norm_title, modification.modifying_norm_id
                    );
                    println!("Resumen: {}", modification.summary);
                }
                println!();
                println!("{}", selected.content);
                println!();
                println!("Historial:");
                for version in norm.versions() {
                    let origin = version
                        .modification
                        .as_ref()
                        .map_or("texto original", |m| m.modifying_norm_id.as_str());
                    println!(
                        "  v{} {} {}",
                        version.version,
                        version.date.format("%Y-%m-%d"),
                        origin
                    );
                }
            }
        }
        Ok(())
    }

    pub(crate) async fn apply(
        &self,
        credentials: &Credentials,
        target: &str,
        modifying: &str,
        content_file: Option<&Path>,
        assume_yes: bool,
    ) -> CliResult {
        let user = self.sign_in(credentials)?;
        let repo = self.norms.repo();
        let generator = self.text_client()?;

        let mut workflow = ModificationWorkflow::open(repo, target, user.as_ref())?;
        workflow.select_modifying_norm(repo, modifying)?;
        if let Some(path) = content_file {
            workflow.edit_draft(std::fs::read_to_string(path)?)?;
        }

        println!("Generando resumen de cambios...");
        let requested = cancellable(workflow.request_summary(&generator))
            .await
            .map(|result| result.map(str::to_string));
        let summary = match requested {
            Some(summary) => summary?,
            None => {
                workflow.abort()?;
                println!("Cancelado. No se aplicaron cambios.");
                return Ok(());
            }
        };
        println!();
        println!("Resumen propuesto:");
        println!("{summary}");
        println!();

        if !assume_yes && !confirm("¿Aplicar la modificación? [s/N] ").await? {
            workflow.abort()?;
            println!("Cancelado. No se aplicaron cambios.");
            return Ok(());
        }

        let updated = workflow.submit(repo)?;
        println!(
            "Norma {} actualizada a la versión {}.",
            updated.id,
            updated.current_version().version
        );
        Ok(())
    }

    pub(crate) async fn chat(&self) -> CliResult {
        let generator = self.text_client()?;
        let mut session = ChatSession::new();
        let mut lines = stdin_lines();
        println!("Asistente legal. Escribe /salir para terminar.");

        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line == "/salir" {
                break;
            }
            if line.is_empty() {
                continue;
            }

            let mut printed = 0;
            let send = session.send(&generator, line, |partial| {
                print!("{}", &partial[printed..]);
                let _ = std::io::stdout().flush();
                printed = partial.len();
            });
            match cancellable(send).await {
                Some(Ok(ChatOutcome::Replied(_))) => println!(),
                Some(Ok(ChatOutcome::Failed { reply, .. })) => println!("\n{reply}"),
                Some(Err(err)) => println!("{err}"),
                None => println!("\n(respuesta cancelada)"),
            }
        }
        info!("event=chat_exit module=cli status=ok turns={}", session.history().len() / 2);
        Ok(())
    }

    pub(crate) async fn search(&self, query: &str) -> CliResult {
        let client = self.text_client()?;
        let Some(answer) = cancellable(client.grounded_search(query)).await else {
            println!("Cancelado.");
            return Ok(());
        };
        let answer = answer?;
        println!("{}", answer.text);
        if !answer.sources.is_empty() {
            println!();
            println!("Fuentes:");
            for source in &answer.sources {
                println!("  - {} {}", source.title.as_deref().unwrap_or(""), source.uri);
            }
        }
        Ok(())
    }

    fn sign_in(&self, credentials: &Credentials) -> Result<Option<User>, Box<dyn Error>> {
        let Some(username) = credentials.user.as_deref() else {
            return Ok(None);
        };
        let password = credentials.password.as_deref().unwrap_or_default();
        Ok(Some(self.directory.authenticate(username, password)?))
    }

    fn text_client(&self) -> Result<GeminiClient, Box<dyn Error>> {
        Ok(GeminiClient::new(self.config.gemini_config())?)
    }
}

/// Runs `future` unless Ctrl-C arrives first; `None` means cancelled.
async fn cancellable<F: Future>(future: F) -> Option<F::Output> {
    tokio::select! {
        output = future => Some(output),
        _ = tokio::signal::ctrl_c() => None,
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn confirm(prompt: &str) -> Result<bool, Box<dyn Error>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let answer = stdin_lines().next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "s" | "si" | "sí" | "y" | "yes"))
}

fn print_card(card: &NormCard) {
    let lock = if card.accessible { " " } else { "*" };
    println!(
        "{lock} {:<18} v{} {}  {}",
        card.id,
        card.latest_version,
        card.last_updated.format("%Y-%m-%d"),
        card.title
    );
    if let Some(excerpt) = &card.excerpt {
        println!("    {excerpt}");
    }
}
