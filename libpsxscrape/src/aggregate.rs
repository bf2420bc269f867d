use crate::classify::{ContentType, LinkRecord, Provider};
use crate::errors::PsxError;
use crate::game_info::GameInfo;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// How records are split into output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    /// games.json (VikingFile), akirabox.json, 1fichier.json, other_servers.json
    #[default]
    ByProvider,
    /// games.json, updates.json, DLC.json
    ByContentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Vikingfile,
    Akirabox,
    Onefichier,
    Other,
    Game,
    Update,
    Dlc,
}

static FILE_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "vikingfile" => "games.json",
    "other" => "other_servers.json",
    "game" => "games.json",
    "update" => "updates.json",
    "dlc" => "DLC.json",
};

const PROVIDER_BUCKETS: [Bucket; 4] = [
    Bucket::Vikingfile,
    Bucket::Akirabox,
    Bucket::Onefichier,
    Bucket::Other,
];
const CONTENT_BUCKETS: [Bucket; 3] = [Bucket::Game, Bucket::Update, Bucket::Dlc];

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Vikingfile => "vikingfile",
            Bucket::Akirabox => "akirabox",
            Bucket::Onefichier => "1fichier",
            Bucket::Other => "other",
            Bucket::Game => "game",
            Bucket::Update => "update",
            Bucket::Dlc => "dlc",
        }
    }

    pub fn file_name(&self) -> String {
        match FILE_NAMES.get(self.name()) {
            Some(f_name) => f_name.to_string(),
            None => format!("{}.json", self.name()),
        }
    }

    pub fn for_provider(provider: &Provider) -> Self {
        match provider {
            Provider::Vikingfile => Bucket::Vikingfile,
            Provider::Akirabox => Bucket::Akirabox,
            Provider::Onefichier => Bucket::Onefichier,
            Provider::Other(_) => Bucket::Other,
        }
    }

    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Game => Bucket::Game,
            ContentType::Update => Bucket::Update,
            ContentType::Dlc => Bucket::Dlc,
        }
    }
}

impl PartitionStrategy {
    pub fn bucket_for(&self, record: &LinkRecord) -> Bucket {
        match self {
            PartitionStrategy::ByProvider => Bucket::for_provider(&record.provider),
            PartitionStrategy::ByContentType => Bucket::for_content_type(record.content_type),
        }
    }

    /// Every bucket this strategy can produce, in output order.
    pub fn buckets(&self) -> &'static [Bucket] {
        match self {
            PartitionStrategy::ByProvider => &PROVIDER_BUCKETS,
            PartitionStrategy::ByContentType => &CONTENT_BUCKETS,
        }
    }
}

/// A record as persisted in an output file, keyed by its url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub info: GameInfo,
    pub name: String,
    /// Only kept when the file name doesn't already say it.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    pub download_text: String,
    pub key_description: String,
}

impl StoredRecord {
    pub fn from_link(record: &LinkRecord, partition: PartitionStrategy) -> Self {
        Self {
            info: record.info.clone(),
            name: record.name.clone(),
            content_type: match partition {
                PartitionStrategy::ByProvider => Some(record.content_type),
                PartitionStrategy::ByContentType => None,
            },
            download_text: record.download_text.clone(),
            key_description: record.key_description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "DATA")]
    pub data: BTreeMap<String, StoredRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFile {
    pub bucket: Bucket,
    pub path: PathBuf,
    pub records: usize,
}

/// Accumulates records of a whole run, one url to record map per bucket.
/// A url lives in a single bucket; inserting it again replaces the old record.
#[derive(Debug, Clone)]
pub struct Aggregator {
    partition: PartitionStrategy,
    buckets: BTreeMap<Bucket, BTreeMap<String, StoredRecord>>,
}

impl Aggregator {
    pub fn new(partition: PartitionStrategy) -> Self {
        Self {
            partition,
            buckets: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: &LinkRecord) -> Bucket {
        let bucket = self.partition.bucket_for(record);
        for (other, links) in self.buckets.iter_mut() {
            if *other != bucket && links.remove(&record.url).is_some() {
                tracing::debug!("{} moved from {} to {}", record.url, other.name(), bucket.name());
            }
        }
        let previous = self
            .buckets
            .entry(bucket)
            .or_default()
            .insert(record.url.clone(), StoredRecord::from_link(record, self.partition));
        if previous.is_some() {
            tracing::debug!("Replacing record for {}", record.url);
        }
        bucket
    }

    /// Inserts every record in order, returns how many were inserted.
    pub fn extend<'a, I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = &'a LinkRecord>,
    {
        records.into_iter().map(|r| self.insert(r)).count()
    }

    pub fn bucket(&self, bucket: Bucket) -> Option<&BTreeMap<String, StoredRecord>> {
        self.buckets.get(&bucket)
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.bucket(bucket).map_or(0, |links| links.len())
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(|links| links.len()).sum()
    }

    /// Record count of every bucket of the partition, empty ones included.
    pub fn counts(&self) -> Vec<(Bucket, usize)> {
        self.partition
            .buckets()
            .iter()
            .map(|b| (*b, self.len(*b)))
            .collect()
    }

    /// Writes one `{"DATA": {...}}` file per non-empty bucket into `dest_dir`,
    /// replacing files of the same name.
    #[tracing::instrument(skip(self))]
    pub async fn write(&self, dest_dir: &Path) -> Result<Vec<WrittenFile>, PsxError> {
        if let Err(e) = fs::create_dir_all(dest_dir).await {
            tracing::error!("Failed to create destination directory\nError : {}", e);
            return Err(PsxError::FileOperationError {
                file_name: dest_dir.display().to_string(),
                message: format!("{} | {}", e, e.kind()),
            });
        }

        let mut written = Vec::new();
        for bucket in self.partition.buckets() {
            let links = match self.buckets.get(bucket) {
                Some(links) if !links.is_empty() => links,
                _ => continue,
            };
            let path = dest_dir.join(bucket.file_name());
            let envelope = Envelope {
                data: links.clone(),
            };
            let json = serde_json::to_string_pretty(&envelope)
                .map_err(|e| PsxError::Serialization(e.to_string()))?;
            if let Err(e) = fs::write(&path, json).await {
                tracing::error!("Error writing to file : {}\nError : {}", path.display(), e);
                return Err(PsxError::FileOperationError {
                    file_name: path.display().to_string(),
                    message: format!("{} | {}", e, e.kind()),
                });
            }
            tracing::info!("Saved {} with {} links", path.display(), links.len());
            written.push(WrittenFile {
                bucket: *bucket,
                path,
                records: links.len(),
            });
        }
        Ok(written)
    }
}

pub async fn load_envelope(path: &Path) -> Result<Envelope, PsxError> {
    let json = fs::read_to_string(path)
        .await
        .map_err(|e| PsxError::FileOperationError {
            file_name: path.display().to_string(),
            message: format!("{} | {}", e, e.kind()),
        })?;
    serde_json::from_str(&json).map_err(|e| PsxError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_info::Region;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("psxscrape_aggregate_{}", name));
        let _ = std::fs::remove_dir_all(&p);
        std::fs::create_dir_all(&p).unwrap();
        p
    }

    fn record(url: &str, content_type: ContentType, provider: Provider) -> LinkRecord {
        LinkRecord {
            url: url.to_string(),
            name: "Game A".to_string(),
            content_type,
            provider,
            download_text: "Viki".to_string(),
            key_description: "Game".to_string(),
            info: GameInfo {
                size: Some("10 GB".to_string()),
                ..GameInfo::with_region(Region::USA)
            },
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Bucket::Vikingfile.file_name(), "games.json");
        assert_eq!(Bucket::Akirabox.file_name(), "akirabox.json");
        assert_eq!(Bucket::Onefichier.file_name(), "1fichier.json");
        assert_eq!(Bucket::Other.file_name(), "other_servers.json");
        assert_eq!(Bucket::Game.file_name(), "games.json");
        assert_eq!(Bucket::Update.file_name(), "updates.json");
        assert_eq!(Bucket::Dlc.file_name(), "DLC.json");
    }

    #[test]
    fn test_last_write_wins() {
        let mut agg = Aggregator::new(PartitionStrategy::ByProvider);
        agg.insert(&record("https://vikingfile.com/x", ContentType::Game, Provider::Vikingfile));
        let mut second = record("https://vikingfile.com/x", ContentType::Update, Provider::Vikingfile);
        second.name = "Game B".to_string();
        agg.insert(&second);
        assert_eq!(agg.len(Bucket::Vikingfile), 1);
        let stored = &agg.bucket(Bucket::Vikingfile).unwrap()["https://vikingfile.com/x"];
        assert_eq!(stored.name, "Game B");
        assert_eq!(stored.content_type, Some(ContentType::Update));
    }

    #[test]
    fn test_url_lives_in_one_bucket() {
        let mut agg = Aggregator::new(PartitionStrategy::ByContentType);
        agg.insert(&record("https://akirabox.com/a", ContentType::Game, Provider::Akirabox));
        agg.insert(&record("https://akirabox.com/a", ContentType::Dlc, Provider::Akirabox));
        assert_eq!(agg.len(Bucket::Game), 0);
        assert_eq!(agg.len(Bucket::Dlc), 1);
        assert_eq!(agg.total(), 1);
        assert_eq!(
            agg.counts(),
            vec![(Bucket::Game, 0), (Bucket::Update, 0), (Bucket::Dlc, 1)]
        );
    }

    #[test]
    fn test_extend_counts_every_insert() {
        let mut agg = Aggregator::new(PartitionStrategy::ByProvider);
        let records = vec![
            record("https://vikingfile.com/x", ContentType::Game, Provider::Vikingfile),
            record("https://akirabox.com/a", ContentType::Game, Provider::Akirabox),
            record("https://vikingfile.com/x", ContentType::Update, Provider::Vikingfile),
        ];
        assert_eq!(agg.extend(records.iter()), 3);
        assert_eq!(agg.total(), 2);
        assert_eq!(agg.len(Bucket::Vikingfile), 1);
    }

    #[test]
    fn test_type_dropped_when_partitioned_by_type() {
        let mut agg = Aggregator::new(PartitionStrategy::ByContentType);
        agg.insert(&record("https://vikingfile.com/u", ContentType::Update, Provider::Vikingfile));
        let stored = &agg.bucket(Bucket::Update).unwrap()["https://vikingfile.com/u"];
        let json = serde_json::to_value(stored).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["region"], "USA");
        assert_eq!(json["size"], "10 GB");
        assert!(json["release"].is_null());
        assert!(json.get("cusa").is_none());
    }

    #[tokio::test]
    async fn test_empty_buckets_are_not_written() {
        let dir = tmp_dir("empty");
        std::fs::write(dir.join("akirabox.json"), "stale").unwrap();
        let mut agg = Aggregator::new(PartitionStrategy::ByProvider);
        agg.insert(&record("https://vikingfile.com/x", ContentType::Game, Provider::Vikingfile));
        agg.insert(&record("https://mega.nz/x", ContentType::Game, Provider::Other("mega".into())));

        let written = agg.write(&dir).await.unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|w| w.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["games.json", "other_servers.json"]);
        assert!(!dir.join("1fichier.json").exists());
        // Untouched, nothing was collected for it this run.
        assert_eq!(std::fs::read_to_string(dir.join("akirabox.json")).unwrap(), "stale");
    }

    #[tokio::test]
    async fn test_written_file_reads_back() {
        let dir = tmp_dir("round_trip");
        std::fs::write(dir.join("games.json"), "old content").unwrap();
        let mut agg = Aggregator::new(PartitionStrategy::ByProvider);
        agg.insert(&record("https://vikingfile.com/a", ContentType::Game, Provider::Vikingfile));
        agg.insert(&record("https://vikingfile.com/b", ContentType::Dlc, Provider::Vikingfile));

        let written = agg.write(&dir).await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].records, 2);

        let raw = std::fs::read_to_string(&written[0].path).unwrap();
        assert!(raw.starts_with("{\n  \"DATA\": {"));
        let envelope = load_envelope(&written[0].path).await.unwrap();
        assert_eq!(&envelope.data, agg.bucket(Bucket::Vikingfile).unwrap());
    }
}
