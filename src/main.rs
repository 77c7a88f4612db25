use medisearch::cache::CacheManager;
use medisearch::cli::{Cli, Commands, ConfigAction, ShellCommand};
use medisearch::config::Config;
use medisearch::corpus::load_corpus;
use medisearch::embedding::{
    Bm25Params, EmbeddingProvider, FastEmbedProvider, HnswParams, HnswVectorStore, KeywordIndex,
    KeywordSearchResult,
};
use medisearch::error::{MedisearchError, Result};
use medisearch::retrieval::{
    FastEmbedReranker, HybridSearcher, RequestContext, SearchError, SearchQuery, SearchResponse,
    SynonymExpander,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            query,
            corpus,
            limit,
            json,
        } => {
            cmd_search(cli.config, &corpus, &query, limit, json)?;
        }
        Commands::Keyword {
            query,
            corpus,
            limit,
            json,
        } => {
            cmd_keyword(cli.config, &corpus, &query, limit, json)?;
        }
        Commands::Shell { corpus, limit } => {
            cmd_shell(cli.config, &corpus, limit)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "medisearch=debug"
    } else {
        "medisearch=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    Config::load_or_default(config_path.as_deref())
}

/// Build a searcher over `corpus` with the configured models
fn build_searcher(config: &Config, corpus: &Path) -> Result<HybridSearcher> {
    let documents = load_corpus(corpus)?;

    let provider = FastEmbedProvider::new(&config.embedding.model)
        .map_err(|e| MedisearchError::Indexing(e.to_string()))?;
    let store = HnswVectorStore::new(
        provider.dimension(),
        HnswParams {
            max_connections: config.indexing.hnsw_m,
            capacity: config.indexing.hnsw_capacity.max(documents.len()),
            ef_construction: config.indexing.hnsw_ef_construction,
            ef_search: config.indexing.hnsw_ef_search,
        },
    );
    let cache = Arc::new(CacheManager::new(config.cache.max_size));

    let mut searcher = HybridSearcher::new(Arc::new(provider), Arc::new(store), cache, config)?;

    if config.reranking.enabled {
        match FastEmbedReranker::new(&config.reranking.model) {
            Ok(reranker) => searcher = searcher.with_cross_encoder(Arc::new(reranker)),
            Err(e) => tracing::warn!("Reranking disabled: {}", e),
        }
    }

    if config.expansion.enabled {
        let expander = SynonymExpander::new(&config.expansion);
        searcher = searcher.with_query_expander(Arc::new(expander));
    }

    searcher.ingest(documents)?;
    Ok(searcher)
}

fn cmd_search(
    config_path: Option<PathBuf>,
    corpus: &Path,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let searcher = build_searcher(&config, corpus)?;

    let response = searcher.search(&SearchQuery::new(query, limit));
    print_response(&response, json)
}

fn cmd_keyword(
    config_path: Option<PathBuf>,
    corpus: &Path,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let documents = load_corpus(corpus)?;

    let index = KeywordIndex::new(Bm25Params {
        k1: config.keyword.bm25_k1,
        b: config.keyword.bm25_b,
    });
    index.index(documents);

    let results = index
        .search(query, limit)
        .map_err(|_| SearchError::IndexNotReady)?;

    if json {
        let items: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "rank": r.rank,
                    "id": r.id,
                    "score": r.score,
                    "fields": r.fields,
                })
            })
            .collect();
        println!("{}", to_json(&items)?);
        return Ok(());
    }

    print_keyword_results(&results);
    Ok(())
}

fn cmd_shell(config_path: Option<PathBuf>, corpus: &Path, limit: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let searcher = build_searcher(&config, corpus)?;
    let context = RequestContext::anonymous();

    println!("Medisearch shell. Type a question, or :stats, :clear, :reset, :quit");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush().map_err(|e| MedisearchError::Io {
            source: e,
            context: "Failed to flush stdout".to_string(),
        })?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| MedisearchError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })?;
        if read == 0 {
            break;
        }

        match ShellCommand::parse(&line) {
            ShellCommand::Empty => continue,
            ShellCommand::Quit => break,
            ShellCommand::Stats => {
                let stats = searcher.cache_stats();
                println!(
                    "Cache: {}/{} entries, {} hits, {} misses, {} evictions, hit rate {:.1}%",
                    stats.size,
                    stats.max_size,
                    stats.hits,
                    stats.misses,
                    stats.evictions,
                    stats.hit_rate * 100.0
                );
            }
            ShellCommand::Clear => {
                searcher.clear_cache();
                println!("✓ Cache cleared");
            }
            ShellCommand::Reset => {
                searcher.reset_cache_stats();
                println!("✓ Cache statistics reset");
            }
            ShellCommand::Unknown(command) => {
                println!("Unknown command: {}", command);
            }
            ShellCommand::Query(query) => {
                let response = searcher.cached_search(&SearchQuery::new(query, limit), &context);
                print_response(&response, false)?;
            }
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path)?;
            let value = serde_json::to_value(&config).map_err(|e| MedisearchError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let value = match section {
                Some(section) => value
                    .get(&section)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Unknown config section: {}", section))?,
                None => value,
            };

            println!("{}", to_json(&value)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| MedisearchError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| MedisearchError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn print_response(response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(response)?);
        return Ok(());
    }

    if !response.success {
        println!(
            "✗ Search failed: {}",
            response.message.as_deref().unwrap_or("unknown error")
        );
        return Ok(());
    }

    if response.results.is_empty() {
        println!(
            "No results{}",
            response
                .message
                .as_deref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{} of {} candidates{}{}{}",
        response.total_found,
        response.total_searched,
        if response.reranking_used {
            ", reranked"
        } else {
            ""
        },
        if response.query_expansion_used {
            ", expanded"
        } else {
            ""
        },
        if response.from_cache { " [cached]" } else { "" }
    );

    for (i, result) in response.results.iter().enumerate() {
        let breakdown = &result.score_breakdown;
        let title = match result.field("disease_name") {
            "" => result.id.as_str(),
            name => name,
        };
        println!(
            "\n{}. {} ({:.3}, {})",
            i + 1,
            title,
            breakdown.final_score,
            result.confidence
        );
        println!(
            "   semantic {:.3}  keyword {:.3}  domain {:.3}  distance {:.3}",
            breakdown.semantic, breakdown.keyword, breakdown.domain, result.raw_distance
        );
        let symptoms = result.field("symptoms");
        if !symptoms.is_empty() {
            println!("   {}", preview(symptoms, 120));
        }
    }

    Ok(())
}

fn print_keyword_results(results: &[KeywordSearchResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }

    for result in results {
        println!("{}. {} ({:.3})", result.rank, result.id, result.score);
        println!("   {}", preview(&result.text, 120));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut)
}
