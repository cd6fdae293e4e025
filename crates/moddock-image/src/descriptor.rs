//! Build descriptor compilation.
//!
//! Compilation is a pure function of the build settings and the resolved
//! mod list: equal inputs give byte-identical files, whatever order the mods
//! arrive in. Every string that comes from outside (URLs, titles, names,
//! property values) is escaped for the place it lands in.

use std::path::Path;

use moddock_common::error::{ModdockError, Result};
use moddock_common::settings::ServerBuildSettings;
use moddock_common::storage::{
    DESCRIPTOR_FILE, ENTRYPOINT_FILE, MODS_DIR, OPS_FILE, PROPERTIES_FILE, WORLD_DIR,
};
use moddock_common::types::{ResolvedMod, Role};
use sha2::{Digest, Sha256};

use crate::properties::{render_ops, render_properties};
use crate::runtime::{base_image, java_version};

const DOCKERFILE_TEMPLATE: &str = r#"# Moddock server image
# server: {{SERVER_NAME}} ({{SERVER_ID}})
# target: {{LOADER_TITLE}} {{GAME_VERSION}}
FROM {{BASE_IMAGE}}

WORKDIR /minecraft
ADD [{{LAUNCHER_URL}}, "/minecraft/server.jar"]

# Requested mods
{{REQUESTED}}
# Required dependencies
{{REQUIRED_DEPENDENCY}}
# Optional dependencies
{{OPTIONAL_DEPENDENCY}}
COPY ["server.properties", "ops.json", "/minecraft/"]
COPY ["entrypoint.sh", "/entrypoint.sh"]
RUN chmod +x /entrypoint.sh && echo "eula={{EULA}}" > /minecraft/eula.txt

ENV ALLOCATED_RAM={{ALLOCATED_RAM}}
EXPOSE 25565/tcp
ENTRYPOINT ["/entrypoint.sh"]
"#;

const ENTRYPOINT: &str = r#"#!/bin/sh
set -e
cd /minecraft
mkdir -p world mods
for jar in /downloads/*.jar; do
    [ -e "$jar" ] || continue
    cp -f "$jar" mods/
done
exec java -Xms"${ALLOCATED_RAM}" -Xmx"${ALLOCATED_RAM}" -jar server.jar nogui
"#;

/// Compiled build files for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    dockerfile: String,
    entrypoint: String,
    properties: String,
    ops: String,
    digest: String,
}

impl BuildDescriptor {
    /// Rendered build instructions.
    #[must_use]
    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    /// Container entrypoint script.
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    /// Rendered `server.properties`.
    #[must_use]
    pub fn properties(&self) -> &str {
        &self.properties
    }

    /// Rendered `ops.json`.
    #[must_use]
    pub fn ops(&self) -> &str {
        &self.ops
    }

    /// Hex SHA-256 over every compiled file; also carried by the image as
    /// the `moddock.descriptor-digest` label.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Writes the files into `dir`, creating it along with empty `world/`
    /// and `mods/` directories when missing. Existing world data is kept.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a directory or file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for sub in [WORLD_DIR, MODS_DIR] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path).map_err(|e| ModdockError::io(&path, e))?;
        }
        for (name, content) in [
            (DESCRIPTOR_FILE, &self.dockerfile),
            (ENTRYPOINT_FILE, &self.entrypoint),
            (PROPERTIES_FILE, &self.properties),
            (OPS_FILE, &self.ops),
        ] {
            let path = dir.join(name);
            std::fs::write(&path, content).map_err(|e| ModdockError::io(&path, e))?;
        }
        tracing::debug!(dir = %dir.display(), digest = %self.digest, "build descriptor written");
        Ok(())
    }
}

/// Compiles the build files for a server.
///
/// # Errors
///
/// Returns `Config` if the game version has no known Java runtime, or
/// `Serialization` if a value cannot be encoded.
pub fn compile(settings: &ServerBuildSettings, resolved: &[ResolvedMod]) -> Result<BuildDescriptor> {
    let java = java_version(settings.loader, &settings.game_version)?;
    let launcher_url = quote_url(&settings.launcher_url)?;
    let blocks = Role::ALL
        .iter()
        .map(|role| download_block(resolved, *role))
        .collect::<Result<Vec<_>>>()?;
    let server_name = comment_text(&settings.name);
    let server_id = comment_text(settings.server_id.as_str());
    let game_version = comment_text(&settings.game_version);
    let base = base_image(java);
    let eula = settings.eula.to_string();
    let memory = format!("{}M", settings.allocated_memory_mb);

    let body = render(DOCKERFILE_TEMPLATE, |key| match key {
        "SERVER_NAME" => Some(server_name.as_str()),
        "SERVER_ID" => Some(server_id.as_str()),
        "LOADER_TITLE" => Some(settings.loader.title()),
        "GAME_VERSION" => Some(game_version.as_str()),
        "BASE_IMAGE" => Some(base.as_str()),
        "LAUNCHER_URL" => Some(launcher_url.as_str()),
        "REQUESTED" => Some(blocks[0].as_str()),
        "REQUIRED_DEPENDENCY" => Some(blocks[1].as_str()),
        "OPTIONAL_DEPENDENCY" => Some(blocks[2].as_str()),
        "EULA" => Some(eula.as_str()),
        "ALLOCATED_RAM" => Some(memory.as_str()),
        _ => None,
    });
    let properties = render_properties(settings);
    let ops = render_ops(settings)?;

    let mut hasher = Sha256::new();
    for part in [body.as_str(), ENTRYPOINT, properties.as_str(), ops.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());

    let labels = [
        ("moddock.server-id", settings.server_id.as_str()),
        ("moddock.loader", settings.loader.as_str()),
        ("moddock.game-version", settings.game_version.as_str()),
        ("moddock.descriptor-digest", digest.as_str()),
    ]
    .iter()
    .map(|(k, v)| -> Result<String> { Ok(format!("{k}={}", serde_json::to_string(v)?)) })
    .collect::<Result<Vec<_>>>()?
    .join(" ");
    let dockerfile = format!("{body}LABEL {labels}\n");

    tracing::debug!(
        server_id = %settings.server_id,
        mods = resolved.len(),
        java,
        %digest,
        "build descriptor compiled"
    );
    Ok(BuildDescriptor {
        dockerfile,
        entrypoint: ENTRYPOINT.to_string(),
        properties,
        ops,
        digest,
    })
}

/// Substitutes `{{KEY}}` placeholders in one pass; substituted text is never
/// rescanned. Unknown keys are left as they are.
fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}").and_then(|end| lookup(&after[..end]).map(|v| (end, v))) {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// `ADD` lines for every mod with `role`, sorted by project id.
fn download_block(resolved: &[ResolvedMod], role: Role) -> Result<String> {
    let mut mods: Vec<&ResolvedMod> = resolved.iter().filter(|m| m.role == role).collect();
    mods.sort_by(|a, b| a.project_id.cmp(&b.project_id));

    let mut block = String::new();
    for m in mods {
        block.push_str(&format!(
            "# {} {} ({})\nADD [{}, \"/downloads/\"]\n",
            comment_text(&m.title),
            comment_text(&m.version_name),
            comment_text(m.project_id.as_str()),
            quote_url(&m.download_url)?,
        ));
    }
    Ok(block)
}

/// Encodes a URL as a JSON string literal for the exec form of `ADD`.
///
/// `$` is percent-encoded so the builder never expands it as a variable.
fn quote_url(url: &str) -> Result<String> {
    Ok(serde_json::to_string(&url.replace('$', "%24"))?)
}

/// Text safe to place after `#` on a single line.
fn comment_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use moddock_common::settings::ServerSettings;
    use moddock_common::types::{Loader, ProjectId, ServerId, VersionId};

    use super::*;

    fn settings() -> ServerBuildSettings {
        let mut s = ServerSettings::new(Loader::Fabric, "1.20.1");
        s.eula = true;
        s.allocated_memory_mb = 4096;
        s.ops = vec!["Notch".into()];
        ServerBuildSettings::new(
            ServerId::new("abc123"),
            "survival",
            &s,
            "https://meta.fabricmc.net/v2/versions/loader/1.20.1/0.15.11/1.0.1/server/jar",
        )
    }

    fn resolved(id: &str, role: Role) -> ResolvedMod {
        ResolvedMod {
            project_id: ProjectId::new(id),
            title: format!("Mod {id}"),
            version_id: VersionId::new(format!("{id}-v1")),
            version_name: "1.0.0".into(),
            game_versions: vec!["1.20.1".into()],
            download_url: format!("https://cdn.modrinth.com/data/{id}/{id}.jar"),
            role,
        }
    }

    fn mods() -> Vec<ResolvedMod> {
        vec![
            resolved("zeta", Role::Requested),
            resolved("opt", Role::OptionalDependency),
            resolved("alpha", Role::Requested),
            resolved("lib", Role::RequiredDependency),
        ]
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let first = compile(&settings(), &mods()).expect("compile");
        let mut shuffled = mods();
        shuffled.reverse();
        let second = compile(&settings(), &shuffled).expect("compile");
        assert_eq!(first, second);
    }

    #[test]
    fn blocks_follow_role_order_then_project_id() {
        let descriptor = compile(&settings(), &mods()).expect("compile");
        let adds: Vec<&str> = descriptor
            .dockerfile()
            .lines()
            .filter(|l| l.contains("/downloads/"))
            .collect();
        assert_eq!(adds.len(), 4);
        for (line, id) in adds.iter().zip(["alpha", "zeta", "lib", "opt"]) {
            assert!(line.contains(&format!("/{id}.jar")), "{line}");
        }
        let text = descriptor.dockerfile();
        let requested = text.find("# Requested mods").unwrap();
        let required = text.find("# Required dependencies").unwrap();
        let optional = text.find("# Optional dependencies").unwrap();
        assert!(requested < required && required < optional);
    }

    #[test]
    fn template_values_are_substituted() {
        let text = compile(&settings(), &[]).expect("compile").dockerfile().to_string();
        assert!(text.contains("FROM eclipse-temurin:17-jre\n"));
        assert!(text.contains("# target: Fabric 1.20.1\n"));
        assert!(text.contains("echo \"eula=true\""));
        assert!(text.contains("ENV ALLOCATED_RAM=4096M\n"));
        assert!(text.contains(
            "ADD [\"https://meta.fabricmc.net/v2/versions/loader/1.20.1/0.15.11/1.0.1/server/jar\", \"/minecraft/server.jar\"]"
        ));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn hostile_strings_cannot_add_instructions() {
        let mut evil = resolved("evil", Role::Requested);
        evil.download_url = "https://x/a.jar\"]\nRUN rm -rf / #${HOME}".into();
        evil.title = "Nice\nRUN curl attacker".into();
        evil.version_name = "{{EULA}}".into();
        let mut s = settings();
        s.name = "srv\r\nUSER root".into();

        let text = compile(&s, &[evil]).expect("compile").dockerfile().to_string();
        let baseline = compile(&settings(), &[resolved("evil", Role::Requested)])
            .expect("compile")
            .dockerfile()
            .lines()
            .count();
        assert_eq!(text.lines().count(), baseline);
        assert!(!text.lines().any(|l| l.starts_with("RUN rm") || l.starts_with("RUN curl")));
        assert!(!text.lines().any(|l| l.starts_with("USER")));
        assert!(text.contains(r#"ADD ["https://x/a.jar\"]\nRUN rm -rf / #%24{HOME}", "/downloads/"]"#));
        assert!(text.contains("# Nice RUN curl attacker {{EULA}} (evil)"));
    }

    #[test]
    fn digest_is_labelled_and_tracks_inputs() {
        let descriptor = compile(&settings(), &mods()).expect("compile");
        assert_eq!(descriptor.digest().len(), 64);
        assert!(descriptor.dockerfile().ends_with(&format!(
            "moddock.descriptor-digest=\"{}\"\n",
            descriptor.digest()
        )));

        let mut more_memory = settings();
        more_memory.allocated_memory_mb = 8192;
        let changed = compile(&more_memory, &mods()).expect("compile");
        assert_ne!(descriptor.digest(), changed.digest());
    }

    #[test]
    fn unknown_game_version_is_rejected() {
        let mut s = settings();
        s.game_version = "24w14a".into();
        assert!(compile(&s, &[]).is_err());
    }

    #[test]
    fn write_to_lays_out_server_directory() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let server_dir = dir.path().join("abc123");
        let descriptor = compile(&settings(), &mods()).expect("compile");
        descriptor.write_to(&server_dir).expect("write");

        let dockerfile = std::fs::read_to_string(server_dir.join(DESCRIPTOR_FILE)).expect("read");
        assert_eq!(dockerfile, descriptor.dockerfile());
        assert!(server_dir.join(ENTRYPOINT_FILE).is_file());
        assert!(server_dir.join(PROPERTIES_FILE).is_file());
        assert!(server_dir.join(OPS_FILE).is_file());
        assert!(server_dir.join(WORLD_DIR).is_dir());
        assert!(server_dir.join(MODS_DIR).is_dir());
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let out = render("a {{X}} b {{Y}} {{", |k| (k == "X").then_some("1"));
        assert_eq!(out, "a 1 b {{Y}} {{");
    }
}
