use serde::Deserialize;
use std::fs::read_to_string;

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;

    fn aggregate(elements: &[impl Validatable]) -> Result<(), String> {
        let options = elements
            .iter()
            .map(Validatable::validate)
            .filter_map(Result::err)
            .collect::<Vec<String>>();
        if options.is_empty() {
            Ok(())
        } else {
            Err(options.join("\n"))
        }
    }
}

pub struct YamlConfig {}

impl YamlConfig {
    pub fn read(filename: &str) -> Result<String, String> {
        read_to_string(filename).map_err(|e| {
            debug!("error on file opening: {}", e);
            format!("error on file opening: {}", e)
        })
    }

    pub fn parse<T>(config: &str) -> Result<T, String>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_yaml::from_str(config).map_err(|e| {
            debug!("error on yaml parsing: {}", e);
            format!("error on yaml parsing: {}", e)
        })
    }

    pub fn parse_valid<T>(config: &str) -> Result<T, String>
    where
        T: for<'de> Deserialize<'de> + Validatable,
    {
        let config: T = Self::parse(config)?;
        match config.validate() {
            Ok(_) => Ok(config),
            Err(e) => {
                debug!("config is not valid: {}", e);
                Err(format!("config is not valid: {}", e))
            }
        }
    }

    pub fn get<T>(filename: &str) -> Result<T, String>
    where
        T: for<'de> Deserialize<'de> + Validatable,
    {
        let file = Self::read(filename)?;
        Self::parse_valid(&file)
    }
}
