//! The options menu: content, rendering, and selection parsing.
//!
//! Menu content is data. Each option carries its digit, a label for the
//! rendered menu, synonym phrases for free-text picks, and the FAQ reply
//! sent when the option is chosen. Synonyms are matched on normalized text,
//! so accents never matter.

use regex::Regex;

use crate::classify::normalize;

/// One selectable menu entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuOption {
    pub digit: u8,
    pub label: String,
    pub synonyms: Vec<String>,
    pub faq_reply: String,
}

/// The full menu: header, options, and the nudge for unparseable picks.
pub struct MenuCatalog {
    header: String,
    footer: String,
    options: Vec<MenuOption>,
    nudge: String,
    digit_pattern: Regex,
}

impl MenuCatalog {
    pub fn new(header: String, footer: String, options: Vec<MenuOption>, nudge: String) -> Self {
        Self {
            header,
            footer,
            options,
            nudge,
            // A lone 1-5 with any surrounding punctuation/whitespace.
            digit_pattern: Regex::new(r"^\W*([1-5])\W*$").unwrap(),
        }
    }

    /// Stock Spanish menu. Synonyms deliberately avoid the classifier's
    /// keyword lists; classification runs first and would win anyway.
    pub fn default_menu() -> Self {
        let options = vec![
            MenuOption {
                digit: 1,
                label: "Catálogo de productos".into(),
                synonyms: vec!["catalogo".into(), "producto".into()],
                faq_reply: "Puedes ver el catálogo completo en el enlace de nuestro perfil. Si buscas algo en específico, dime el nombre del producto y te confirmo si lo tenemos.".into(),
            },
            MenuOption {
                digit: 2,
                label: "Horarios y ubicación".into(),
                synonyms: vec!["horario".into(), "ubicacion".into(), "direccion".into()],
                faq_reply: "Atendemos de lunes a sábado, de 9:00 a.m. a 6:00 p.m. Escríbenos y te compartimos la dirección de la sucursal más cercana.".into(),
            },
            MenuOption {
                digit: 3,
                label: "Entregas a domicilio".into(),
                synonyms: vec!["entrega".into(), "despacho".into(), "domicilio".into()],
                faq_reply: "Hacemos entregas a domicilio en todo el país. En la zona metropolitana el pedido llega en 24 a 48 horas laborables.".into(),
            },
            MenuOption {
                digit: 4,
                label: "Hablar con un asesor".into(),
                synonyms: vec!["asesor".into(), "agente".into(), "humano".into()],
                faq_reply: "¡Claro! Un miembro del equipo te escribirá en breve. Nuestro horario de atención es de lunes a sábado, de 9:00 a.m. a 6:00 p.m.".into(),
            },
            MenuOption {
                digit: 5,
                label: "Otra consulta".into(),
                synonyms: vec!["consulta".into(), "ayuda".into()],
                faq_reply: "Cuéntanos tu consulta y te respondemos lo antes posible 🙌".into(),
            },
        ];

        Self::new(
            "¡Hola! Gracias por escribirnos 😊 ¿En qué te podemos ayudar hoy?".into(),
            "Respóndenos con el número de la opción.".into(),
            options,
            "No logramos entender tu mensaje 🙈 Respóndenos con un número del 1 al 5 y te ayudamos más rápido.".into(),
        )
    }

    /// The menu as one outbound message.
    pub fn render_menu(&self) -> String {
        let mut lines = vec![self.header.clone(), String::new()];
        for option in &self.options {
            lines.push(format!("{}) {}", option.digit, option.label));
        }
        lines.push(String::new());
        lines.push(self.footer.clone());
        lines.join("\n")
    }

    /// Read a message as a menu pick: a lone digit first, then synonym
    /// phrases in option order. `None` means the nudge goes out.
    pub fn parse_selection(&self, text: &str) -> Option<&MenuOption> {
        let t = normalize(text);

        if let Some(caps) = self.digit_pattern.captures(&t) {
            let digit: u8 = caps[1].parse().ok()?;
            return self.options.iter().find(|o| o.digit == digit);
        }

        self.options
            .iter()
            .find(|o| o.synonyms.iter().any(|s| t.contains(normalize(s).as_str())))
    }

    pub fn nudge(&self) -> &str {
        &self.nudge
    }
}
